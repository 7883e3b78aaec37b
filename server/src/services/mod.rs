pub mod search_orchestrator;
pub mod suggestion_fetcher;
