//! Command runner: wires the HTTP transport into the engine and reports.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use hashdrop_http::{ApiClient, AuthContext, PresignedStore};
use hashdrop_upload::{
    AlwaysOnline, UploadEngine, UploadError, UploadEvent, UploadReport, UploadRequest,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::Command;
use crate::config::{Config, config_path};

/// Runs one command to completion.
pub async fn run(command: Command, config: Config) -> anyhow::Result<ExitCode> {
    if let Command::Config = command {
        println!("# {}", config_path()?.display());
        print!("{}", config.redacted()?);
        return Ok(ExitCode::SUCCESS);
    }

    if config.access_token.is_none() {
        anyhow::bail!(
            "no access token configured; set access_token in {} or pass --token",
            config_path()?.display()
        );
    }

    let auth = Arc::new(AuthContext::new(config.access_token.clone()));
    let backend = ApiClient::new(&config.api_base, Arc::clone(&auth))?;
    let store = PresignedStore::new()?;
    let mut engine = UploadEngine::new(
        config.engine.clone(),
        Arc::new(backend),
        Arc::new(store),
        Arc::new(AlwaysOnline),
    );

    let printer = match engine.take_events() {
        Some(rx) => spawn_printer(rx, Arc::clone(&auth)),
        None => anyhow::bail!("engine event stream unavailable"),
    };

    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight transfers");
            cancel.cancel();
        }
    });

    let (ok, auth_expired) = match command {
        Command::Upload { files, folder } => {
            let folder_id = folder.unwrap_or(config.folder_id);
            let requests = files
                .into_iter()
                .map(|path| UploadRequest::from_path(path, folder_id))
                .collect();
            let reports = engine.upload_batch(requests).await;
            summarize(&reports)
        }
        Command::Replace { file_id, file } => {
            let report = engine
                .replace(file_id, UploadRequest::from_path(file, config.folder_id))
                .await;
            summarize(std::slice::from_ref(&report))
        }
        Command::Abort { upload_id } => match engine.abort_session(&upload_id).await {
            Ok(()) => {
                println!("released upload {upload_id}");
                (true, false)
            }
            Err(e) => {
                eprintln!("could not release upload {upload_id}: {e}");
                (false, matches!(e, UploadError::AuthExpired))
            }
        },
        Command::Config => (true, false),
    };

    drop(engine);
    let printer_saw_expiry = printer.await.unwrap_or(false);

    if auth_expired || printer_saw_expiry {
        auth.invalidate();
        forget_token()?;
        eprintln!("access token expired; it has been removed from the configuration");
    }

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Clears the stored token, leaving command-line overrides out of the file.
fn forget_token() -> anyhow::Result<()> {
    let mut stored = Config::load()?;
    if stored.access_token.take().is_some() {
        stored.save()?;
    }
    Ok(())
}

/// Prints events until the engine is dropped. Returns whether any task
/// reported an expired credential.
fn spawn_printer(
    mut rx: mpsc::Receiver<UploadEvent>,
    auth: Arc<AuthContext>,
) -> JoinHandle<bool> {
    tokio::spawn(async move {
        let mut printer = EventPrinter::new(auth);
        while let Some(event) = rx.recv().await {
            if let Some(line) = printer.render(&event) {
                println!("{line}");
            }
        }
        printer.auth_expired
    })
}

/// Turns events into progress lines: one per phase change and one per
/// whole-percent step.
///
/// An expired credential is dropped from `auth` on the spot, so sibling
/// tasks stop presenting it.
struct EventPrinter {
    auth: Arc<AuthContext>,
    names: HashMap<Uuid, String>,
    last_percent: HashMap<Uuid, u32>,
    auth_expired: bool,
}

impl EventPrinter {
    fn new(auth: Arc<AuthContext>) -> Self {
        Self {
            auth,
            names: HashMap::new(),
            last_percent: HashMap::new(),
            auth_expired: false,
        }
    }

    fn render(&mut self, event: &UploadEvent) -> Option<String> {
        match event {
            UploadEvent::Phase {
                task_id,
                name,
                phase,
            } => {
                self.names.insert(*task_id, name.clone());
                Some(format!("{name}: {phase}"))
            }
            UploadEvent::Progress { task_id, percent } => {
                let whole = percent.floor() as u32;
                let last = self.last_percent.insert(*task_id, whole);
                if last == Some(whole) {
                    return None;
                }
                Some(format!("{}: {whole}%", self.name(task_id)))
            }
            UploadEvent::Completed { .. } | UploadEvent::Failed { .. } => None,
            UploadEvent::Aborted {
                task_id,
                upload_id,
                reason,
            } => Some(format!(
                "{}: released upload {upload_id} ({reason})",
                self.name(task_id)
            )),
            UploadEvent::AuthExpired { .. } => {
                if !self.auth_expired {
                    self.auth.invalidate();
                    self.auth_expired = true;
                }
                None
            }
        }
    }

    fn name(&self, task_id: &Uuid) -> &str {
        self.names.get(task_id).map_or("upload", String::as_str)
    }
}

/// Prints one line per report. Returns `(all succeeded, auth expired)`.
fn summarize(reports: &[UploadReport]) -> (bool, bool) {
    let mut ok = true;
    let mut auth_expired = false;

    for report in reports {
        match &report.outcome {
            Ok(file) => {
                let place = file.url.as_deref().unwrap_or("stored");
                let how = if file.instant { " (already stored)" } else { "" };
                println!("ok   {} -> {place}{how}", report.name);
            }
            Err(e) => {
                ok = false;
                eprintln!("FAIL {}: {e}", report.name);
                match e {
                    UploadError::FinalizeFailed { pending, .. } => eprintln!(
                        "     upload {} is still open; release it with `hashdrop abort {}`",
                        pending.upload_id, pending.upload_id
                    ),
                    UploadError::AuthExpired => auth_expired = true,
                    _ => {}
                }
            }
        }
    }

    (ok, auth_expired)
}
