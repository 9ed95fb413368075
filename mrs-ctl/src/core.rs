use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use common::client::CoordinatorClient;
use common::rpc::JobSnapshot;

pub async fn done(client: &mut CoordinatorClient) -> anyhow::Result<bool> {
    let done = client.query_done().await.context("QueryDone failed")?;
    println!("{done}");
    Ok(done)
}

pub async fn status(client: &mut CoordinatorClient) -> anyhow::Result<()> {
    let snapshot = client.query_status().await.context("QueryStatus failed")?;

    println!("[Status]");
    println!("{}", format_status(&snapshot));
    Ok(())
}

/// Poll until the coordinator reports the job done.
pub async fn wait(client: &mut CoordinatorClient, interval: Duration) -> anyhow::Result<()> {
    let mut last = None;
    loop {
        if client.query_done().await.context("QueryDone failed")? {
            println!("done");
            return Ok(());
        }

        let snapshot = client.query_status().await.context("QueryStatus failed")?;
        if last != Some(snapshot) {
            println!("{}", format_status(&snapshot));
            last = Some(snapshot);
        } else {
            debug!("no progress since last poll");
        }
        tokio::time::sleep(interval).await;
    }
}

fn format_status(snapshot: &JobSnapshot) -> String {
    let phase = if snapshot.map_finished < snapshot.map_total {
        "map"
    } else if snapshot.reduce_finished < snapshot.reduce_total {
        "reduce"
    } else {
        "complete"
    };
    format!(
        "phase: {phase}\nmap:    {}/{}\nreduce: {}/{}",
        snapshot.map_finished, snapshot.map_total, snapshot.reduce_finished, snapshot.reduce_total
    )
}
