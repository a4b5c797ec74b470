//! Implementation of the `cadence inbox` command.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Config, InboxItem};

#[derive(Args, Debug)]
pub struct InboxArgs {
    /// How many items to show, newest first
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct InboxOutput {
    pub items: Vec<InboxItem>,
}

impl CommandOutput for InboxOutput {
    fn to_human(&self) -> String {
        if self.items.is_empty() {
            return "Inbox is empty.".to_string();
        }
        let mut t = table(&["WHEN", "TITLE", "CONTENT"]);
        for item in &self.items {
            let title = Cell::new(truncate(&item.title, 40));
            t.add_row(vec![
                Cell::new(item.created_at.format("%Y-%m-%d %H:%M").to_string()),
                if item.failed { title.fg(Color::Red) } else { title },
                Cell::new(truncate(&item.content.replace('\n', " "), 80)),
            ]);
        }
        t.to_string()
    }
}

pub async fn execute(args: InboxArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let items = ctx.stores.inbox.list_recent(args.limit).await?;
    output(&InboxOutput { items }, json_mode);
    Ok(())
}
