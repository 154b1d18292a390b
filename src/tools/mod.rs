//! Tool capabilities and the registry the dispatcher runs against

pub mod file;
pub mod registry;
pub mod system;
pub mod web;

use std::sync::Arc;

use crate::memory::MemoryStore;

pub use registry::{Arity, MAX_OUTPUT_CHARS, ToolRegistry, ToolRegistryBuilder, ToolResult};

/// Assemble the full built-in capability table.
///
/// Called once at startup; the returned table is immutable for the session.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn builtin_registry(memory: &Arc<MemoryStore>) -> ToolRegistry {
    let builder = ToolRegistry::builder()
        // File tools
        .register(
            "read_file",
            "read_file(filepath): read a file's contents",
            Arity::exact(1),
            |args| file::read_file(&args[0]),
        )
        .register(
            "write_file",
            "write_file(filepath, content): create or overwrite a file",
            Arity::range(1, 2),
            |args| file::write_file(&args[0], args.get(1).map_or("", String::as_str)),
        )
        .register(
            "create_file",
            "create_file(filepath, content): same as write_file",
            Arity::range(1, 2),
            |args| file::write_file(&args[0], args.get(1).map_or("", String::as_str)),
        )
        .register(
            "append_to_file",
            "append_to_file(filepath, content): add to an existing file",
            Arity::exact(2),
            |args| file::append_to_file(&args[0], &args[1]),
        )
        .register(
            "list_files",
            "list_files(directory): list files in a folder",
            Arity::range(0, 1),
            |args| file::list_files(args.first().map_or(".", String::as_str)),
        )
        .register(
            "delete_file",
            "delete_file(filepath): delete a file",
            Arity::exact(1),
            |args| file::delete_file(&args[0]),
        )
        .register(
            "move_file",
            "move_file(source, destination): move a file",
            Arity::exact(2),
            |args| file::move_file(&args[0], &args[1]),
        )
        .register(
            "rename_file",
            "rename_file(filepath, new_name): rename a file",
            Arity::exact(2),
            |args| file::rename_file(&args[0], &args[1]),
        )
        .register(
            "create_folder",
            "create_folder(path): create a new folder",
            Arity::exact(1),
            |args| file::create_folder(&args[0]),
        )
        .register(
            "search_files",
            "search_files(directory, pattern): find files by name",
            Arity::exact(2),
            |args| file::search_files(&args[0], &args[1]),
        )
        .register(
            "file_info",
            "file_info(filepath): size and timestamps for a file",
            Arity::exact(1),
            |args| file::file_info(&args[0]),
        )
        // Web tools
        .register(
            "web_search",
            "web_search(query): search the web",
            Arity::exact(1),
            |args| web::web_search(&args[0]),
        )
        .register(
            "fetch_webpage",
            "fetch_webpage(url): read a web page's text",
            Arity::exact(1),
            |args| web::fetch_webpage(&args[0]),
        )
        .register(
            "open_url",
            "open_url(url): open a URL in the browser",
            Arity::exact(1),
            |args| web::open_url(&args[0]),
        )
        // System tools
        .register(
            "current_time",
            "current_time(): the current time",
            Arity::exact(0),
            |_| system::current_time(),
        )
        .register(
            "current_date",
            "current_date(): today's date",
            Arity::exact(0),
            |_| system::current_date(),
        )
        .register(
            "run_command",
            "run_command(command): run a shell command",
            Arity::exact(1),
            |args| system::run_command(&args[0]),
        )
        .register(
            "open_app",
            "open_app(app_name): launch an application",
            Arity::exact(1),
            |args| system::open_app(&args[0]),
        )
        .register(
            "system_info",
            "system_info(): basic host information",
            Arity::exact(0),
            |_| system::system_info(),
        );

    register_memory_tools(builder, memory).build()
}

/// Memory tools close over the shared store; the table itself stays
/// immutable once built.
fn register_memory_tools(
    builder: ToolRegistryBuilder,
    memory: &Arc<MemoryStore>,
) -> ToolRegistryBuilder {
    let remember = Arc::clone(memory);
    let recall = Arc::clone(memory);
    let search = Arc::clone(memory);
    let add_task = Arc::clone(memory);
    let list_tasks = Arc::clone(memory);
    let complete = Arc::clone(memory);

    builder
        .register(
            "remember_fact",
            "remember_fact(category, fact): save a fact about the user",
            Arity::exact(2),
            move |args| {
                remember
                    .add_fact(&args[0], &args[1])
                    .map(|()| format!("Remembered: {}", args[1]))
                    .map_err(|e| e.to_string())
            },
        )
        .register(
            "recall_facts",
            "recall_facts(category): list stored facts, optionally by category",
            Arity::range(0, 1),
            move |args| {
                let facts = recall.facts(args.first().map(String::as_str));
                if facts.is_empty() {
                    return Ok("No stored facts yet".to_string());
                }
                Ok(facts
                    .iter()
                    .map(|(category, entry)| format!("[{category}] {}", entry.content))
                    .collect::<Vec<_>>()
                    .join("\n"))
            },
        )
        .register(
            "search_memory",
            "search_memory(query): search past conversations",
            Arity::exact(1),
            move |args| {
                let turns = search
                    .search_conversations(&args[0], 10)
                    .map_err(|e| e.to_string())?;
                if turns.is_empty() {
                    return Ok(format!("Nothing in memory about '{}'", args[0]));
                }
                Ok(turns
                    .iter()
                    .map(|t| {
                        format!(
                            "{}: you said \"{}\", I said \"{}\"",
                            t.timestamp.format("%Y-%m-%d"),
                            t.user,
                            t.assistant
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            },
        )
        .register(
            "add_task",
            "add_task(task, priority): add a task or reminder",
            Arity::range(1, 2),
            move |args| {
                let priority = args.get(1).map_or("medium", String::as_str);
                add_task
                    .add_task(&args[0], priority)
                    .map(|id| format!("Added task #{id}: {}", args[0]))
                    .map_err(|e| e.to_string())
            },
        )
        .register(
            "list_tasks",
            "list_tasks(status): list tasks (pending, completed, or all)",
            Arity::range(0, 1),
            move |args| {
                let status = args.first().map_or("pending", String::as_str);
                let tasks = list_tasks.tasks(status).map_err(|e| e.to_string())?;
                if tasks.is_empty() {
                    return Ok(format!("No {status} tasks"));
                }
                Ok(tasks
                    .iter()
                    .map(|t| format!("#{} [{}] {} ({})", t.id, t.status, t.task, t.priority))
                    .collect::<Vec<_>>()
                    .join("\n"))
            },
        )
        .register(
            "complete_task",
            "complete_task(task_id): mark a task as done",
            Arity::exact(1),
            move |args| {
                let id: i64 = args[0]
                    .trim_start_matches('#')
                    .parse()
                    .map_err(|_| format!("not a task id: {}", args[0]))?;
                if complete.complete_task(id).map_err(|e| e.to_string())? {
                    Ok(format!("Task #{id} marked as complete"))
                } else {
                    Err(format!("no task with id #{id}"))
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Directive;

    fn test_registry() -> (tempfile::TempDir, ToolRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryStore::open(dir.path()).unwrap());
        (dir, builtin_registry(&memory))
    }

    #[test]
    fn builtin_table_has_the_expected_names() {
        let (_dir, registry) = test_registry();
        let names: Vec<&str> = registry.names().collect();
        for expected in [
            "read_file",
            "create_file",
            "web_search",
            "run_command",
            "remember_fact",
            "complete_task",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn memory_tools_roundtrip_through_dispatch() {
        let (_dir, registry) = test_registry();

        let result = registry.dispatch(&Directive {
            name: "remember_fact".to_string(),
            arguments: vec!["interests".to_string(), "loves pizza".to_string()],
        });
        assert!(result.success, "{}", result.output);
        assert!(result.output.contains("Remembered"));

        let result = registry.dispatch(&Directive {
            name: "recall_facts".to_string(),
            arguments: vec!["interests".to_string()],
        });
        assert!(result.success);
        assert!(result.output.contains("loves pizza"));
    }

    #[test]
    fn task_tools_roundtrip_through_dispatch() {
        let (_dir, registry) = test_registry();

        let added = registry.dispatch(&Directive {
            name: "add_task".to_string(),
            arguments: vec!["water plants".to_string()],
        });
        assert!(added.success);

        let listed = registry.dispatch(&Directive {
            name: "list_tasks".to_string(),
            arguments: vec![],
        });
        assert!(listed.output.contains("water plants"));

        let done = registry.dispatch(&Directive {
            name: "complete_task".to_string(),
            arguments: vec!["#1".to_string()],
        });
        assert!(done.success, "{}", done.output);
    }
}
