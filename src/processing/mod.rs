pub mod score_aggregator;
pub mod typing_engine;
