//! `unical search`

use unical_core::{DateRange, SearchCriteria, SearchEngine, SearchResults};
use unical_sync::SyncOrchestrator;

use crate::cli::SearchArgs;
use crate::error::{ClientError, ClientResult};
use crate::output;

/// Turns the command-line filters into search criteria.
pub fn criteria(args: &SearchArgs) -> ClientResult<SearchCriteria> {
    let mut criteria = SearchCriteria::new()
        .with_keyword(args.keyword.clone())
        .with_include_completed(args.include_completed);
    if let Some(from) = args.from {
        let to = args.to.unwrap_or(from);
        let range = DateRange::try_new(from, to)
            .ok_or_else(|| ClientError::Usage(format!("--from {from} is after --to {to}")))?;
        criteria = criteria.with_date_range(range);
    }
    for provider in &args.providers {
        criteria = criteria.with_provider(*provider);
    }
    for owner in &args.owners {
        criteria = criteria.with_owner(owner.clone());
    }
    Ok(criteria)
}

/// Runs the criteria against the engine, honouring `--events-only` and
/// `--tasks-only`.
pub fn search(engine: &SearchEngine<'_>, args: &SearchArgs) -> ClientResult<SearchResults> {
    let criteria = criteria(args)?;
    Ok(SearchResults {
        events: if args.tasks_only {
            Vec::new()
        } else {
            engine.advanced_search_events(&criteria)
        },
        tasks: if args.events_only {
            Vec::new()
        } else {
            engine.advanced_search_tasks(&criteria)
        },
    })
}

/// Syncs once, then prints the matches.
pub async fn run(orchestrator: &SyncOrchestrator, args: &SearchArgs) -> ClientResult<()> {
    // Reject bad filters before touching the network.
    criteria(args)?;
    orchestrator.sync_all().await;

    let store = orchestrator.store();
    let store = store.read().await;
    let results = search(&SearchEngine::new(&store), args)?;
    if args.json {
        println!("{}", output::to_json(&results));
    } else {
        print!("{}", output::render_results(&results));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use unical_core::{AggregateStore, CalendarEvent, Provider, Task};

    fn store() -> AggregateStore {
        let mut store = AggregateStore::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        store.add_event(
            CalendarEvent::new("e1", "Design review", Provider::Google)
                .with_times(start, start + chrono::Duration::hours(1))
                .with_location("Conference Room A"),
        );
        store.add_event(
            CalendarEvent::new("e2", "Lunch", Provider::Outlook)
                .with_times(start, start + chrono::Duration::hours(1)),
        );
        store.add_task(Task::new("t1", "Book conference", Provider::Apple));
        store.add_task(Task::new("t2", "Conference notes", Provider::Apple).with_completed(true));
        store
    }

    fn args(keyword: &str) -> SearchArgs {
        SearchArgs {
            keyword: keyword.to_string(),
            ..SearchArgs::default()
        }
    }

    #[test]
    fn keyword_matches_events_and_open_tasks() {
        let store = store();
        let results = search(&SearchEngine::new(&store), &args("conference")).unwrap();
        assert_eq!(results.events.len(), 1);
        assert_eq!(results.tasks.len(), 1);
        assert_eq!(results.tasks[0].id, "t1");
    }

    #[test]
    fn include_completed_and_tasks_only() {
        let store = store();
        let mut args = args("conference");
        args.include_completed = true;
        args.tasks_only = true;
        let results = search(&SearchEngine::new(&store), &args).unwrap();
        assert!(results.events.is_empty());
        assert_eq!(results.tasks.len(), 2);
    }

    #[test]
    fn provider_and_range_filters() {
        let store = store();
        let mut args = args("");
        args.providers = vec![Provider::Outlook];
        args.from = NaiveDate::from_ymd_opt(2024, 6, 1);
        args.to = NaiveDate::from_ymd_opt(2024, 6, 30);
        args.events_only = true;
        let results = search(&SearchEngine::new(&store), &args).unwrap();
        assert_eq!(results.events.len(), 1);
        assert_eq!(results.events[0].id, "e2");

        args.from = NaiveDate::from_ymd_opt(2024, 7, 1);
        args.to = NaiveDate::from_ymd_opt(2024, 7, 31);
        assert!(search(&SearchEngine::new(&store), &args).unwrap().is_empty());
    }

    #[test]
    fn inverted_range_is_a_usage_error() {
        let mut args = args("");
        args.from = NaiveDate::from_ymd_opt(2024, 6, 30);
        args.to = NaiveDate::from_ymd_opt(2024, 6, 1);
        assert!(matches!(criteria(&args), Err(ClientError::Usage(_))));
    }
}
