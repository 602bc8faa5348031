use anyhow::Result;
use recall::commands::{handoff, lesson, relevance, status};
use recall::store::Recall;

use super::types::{Commands, HandoffCommands};

pub fn dispatch(command: Commands) -> Result<()> {
    let store = Recall::from_env();

    match command {
        Commands::Add {
            category,
            title,
            content,
            force,
            system,
            no_promote,
        } => lesson::add(&store, &category, &title, &content, force, system, no_promote),
        Commands::AddAi {
            category,
            title,
            content,
            system,
            no_promote,
        } => lesson::add_ai(&store, &category, &title, &content, system, no_promote),
        Commands::AddSystem {
            category,
            title,
            content,
            force,
        } => lesson::add(&store, &category, &title, &content, force, true, false),
        Commands::Cite { lesson_id } => lesson::cite(&store, &lesson_id),
        Commands::Inject { top_n } => lesson::inject(&store, top_n),
        Commands::List {
            project,
            system,
            search,
            category,
            stale,
        } => lesson::list(&store, project, system, search.as_deref(), category.as_deref(), stale),
        Commands::Decay { days } => lesson::decay(&store, days),
        Commands::Edit { lesson_id, content } => lesson::edit(&store, &lesson_id, &content),
        Commands::Delete { lesson_id } => lesson::delete(&store, &lesson_id),
        Commands::Promote { lesson_id } => lesson::promote(&store, &lesson_id),
        Commands::ScoreRelevance {
            text,
            top,
            min_score,
            timeout,
        } => relevance::score(&store, &text, top, min_score, timeout),
        Commands::Handoff { command } => match command {
            HandoffCommands::Add {
                title,
                desc,
                refs,
                phase,
                agent,
            } => handoff::add(&store, &title, desc.as_deref(), refs.as_deref(), &phase, &agent),
            HandoffCommands::Update {
                id,
                status,
                tried,
                next,
                refs,
                desc,
                phase,
                agent,
                checkpoint,
                blocked_by,
            } => handoff::update(
                &store,
                &id,
                handoff::UpdateArgs {
                    status,
                    tried,
                    next,
                    refs,
                    desc,
                    phase,
                    agent,
                    checkpoint,
                    blocked_by,
                },
            ),
            HandoffCommands::Complete { id } => handoff::complete(&store, &id),
            HandoffCommands::Archive { id } => handoff::archive(&store, &id),
            HandoffCommands::Delete { id } => handoff::delete(&store, &id),
            HandoffCommands::List {
                status,
                include_completed,
            } => handoff::list(&store, status.as_deref(), include_completed),
            HandoffCommands::Show { id } => handoff::show(&store, &id),
            HandoffCommands::Inject => handoff::inject(&store),
            HandoffCommands::SyncTodos { todos_json } => handoff::sync_todos(&store, &todos_json),
            HandoffCommands::InjectTodos => handoff::inject_todos(&store),
            HandoffCommands::Ready => handoff::ready(&store),
            HandoffCommands::SetContext { id, context_json } => {
                handoff::set_context(&store, &id, &context_json)
            }
            HandoffCommands::Resume { id } => handoff::resume(&store, &id),
        },
        Commands::Status { project, limit } => status::execute(project.as_deref(), limit),
    }
}
