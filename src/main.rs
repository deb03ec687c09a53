use crate::cli::run;

pub mod cli;
mod config;
pub mod domain;
pub mod enrich;
pub mod http;
pub mod storage;

fn main() -> anyhow::Result<()> {
    run()
}
