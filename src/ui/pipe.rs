use crate::state::{Update, WatchState};
use crate::watcher::ProgressWatcher;
use std::io::Write;
use tokio::sync::mpsc;

/// Display progress in pipe mode (stdout only, for scripting)
pub async fn display_progress_pipe(config: crate::Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (tx, mut rx) = mpsc::channel(32);
    let handle = ProgressWatcher::start(
        &config.stream_url()?,
        config.source_options(),
        config.page(),
        &config.bar_id,
        &config.eta_id,
        tx,
    )?;

    let stdout = std::io::stdout();
    let mut last_line: Option<String> = None;
    let mut last_err: Option<String> = None;

    while let Some(upd) = rx.recv().await {
        if let Some(line) = pipe_line(&upd)
            && last_line.as_ref() != Some(&line)
        {
            let mut out = stdout.lock();
            writeln!(out, "{line}")?;
            out.flush()?;
            last_line = Some(line);
        }
        if upd.err != last_err {
            if let Some(err) = &upd.err {
                eprintln!("[progress-watch] {err}");
            }
            last_err = upd.err.clone();
        }
        if upd.state == WatchState::Done {
            break;
        }
    }

    handle.stop();
    let state = handle.wait().await?;
    match (state, last_err) {
        (WatchState::Watching, Some(err)) => Err(err.into()),
        _ => Ok(()),
    }
}

/// `"<bar text>\t<eta>"`, or `None` before the first report arrived.
fn pipe_line(upd: &Update) -> Option<String> {
    if upd.bar.text.is_empty() && upd.eta.text.is_empty() {
        return None;
    }
    Some(format!("{}\t{}", upd.bar.text, upd.eta.text))
}
