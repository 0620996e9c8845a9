//! Terminal front-end for the community chat.
//!
//! Lines typed on stdin are sent as messages. Commands:
//! `/name <new name>`, `/delete <n>` (the n-th visible message), `/quit`.

use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;

use haven_client::config::ClientConfig;
use haven_client::view::ChatView;
use haven_client::{ChatSession, IdentityContext};
use haven_shared::protocol::visible_messages;
use haven_shared::ChatMessage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    haven_client::init_tracing();

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let storage = config.open_storage()?;
    let identity = Arc::new(IdentityContext::load_or_create(storage)?);
    let session = Arc::new(
        ChatSession::new(identity, config.message_store()).with_filter(config.content_filter()?),
    );

    let me = session.identity();
    println!("Chatting as {} ({})", me.username, me.user_id);

    let mut subscription = session.subscribe().await?;
    let (latest_tx, latest_rx) = watch::channel(Vec::<ChatMessage>::new());

    let printer = {
        let session = session.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                render(&session.project(&snapshot, &Local::now()));
                latest_tx.send_replace(visible_messages(&snapshot));
            }
        })
    };

    let countdown = {
        let mut ticker = session.cooldown_ticker();
        tokio::spawn(async move {
            let mut shown = ticker.current().remaining_secs();
            while let Some(status) = ticker.changed().await {
                let secs = status.remaining_secs();
                if secs == shown {
                    continue;
                }
                shown = secs;
                if status.allowed {
                    println!("ready to send");
                } else if secs % 10 == 0 || secs <= 3 {
                    println!("next message in {secs}s");
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }

        let outcome = if let Some(name) = line.strip_prefix("/name ") {
            session.rename(name).map(|name| println!("Now chatting as {name}"))
        } else if let Some(n) = line.strip_prefix("/delete ") {
            match pick(&latest_rx, n) {
                Some(message) => session.delete(&message).await,
                None => {
                    println!("No message #{n}");
                    Ok(())
                }
            }
        } else {
            session.send(line).await.map(|_| ())
        };

        if let Err(e) = outcome {
            println!("! {}", e.user_message());
        }
    }

    countdown.abort();
    printer.abort();
    Ok(())
}

fn pick(latest: &watch::Receiver<Vec<ChatMessage>>, n: &str) -> Option<ChatMessage> {
    let index: usize = n.trim().parse().ok()?;
    latest.borrow().get(index.checked_sub(1)?).cloned()
}

fn render(view: &ChatView) {
    println!("--- {} message(s) ---", view.message_count());
    let mut n = 0;
    for group in &view.groups_by_day {
        println!("[{}]", group.label);
        for item in &group.items {
            n += 1;
            let own = if item.is_own { " (you)" } else { "" };
            println!(
                "{n:>3} {} {}{own}: {}",
                item.time_label, item.message.username, item.message.text
            );
        }
    }
}
