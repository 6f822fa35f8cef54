use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use points_ledger::{
    IdentityPolicy,
    Ledger,
    LedgerError,
    LedgerService,
    Mode,
    PendingTransaction,
    Session,
    UserRecord,
    backend::LedgerBackend,
    config::AppConfig,
};
use tracing::{
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 5;

/// Everything the UI needs for one frame.
#[derive(Clone, Debug, Default)]
pub struct AppSnapshot {
    pub identity: Option<String>,
    pub source: String,
    pub users: Vec<UserRecord>,
    pub status: String,
    pub errors: Vec<String>,
    pub activity: Vec<String>,
}

pub struct AppController<S> {
    policy: IdentityPolicy,
    service: S,
    source: String,
    ledger: Option<Ledger<S>>,
    status: String,
    errors: Vec<String>,
}

impl<S: LedgerService + Clone> AppController<S> {
    pub fn new(policy: IdentityPolicy, service: S, source: impl Into<String>) -> Self {
        Self {
            policy,
            service,
            source: source.into(),
            ledger: None,
            status: String::from("Locked"),
            errors: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(..excess);
        }
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let (identity, users, activity) = match &self.ledger {
            Some(ledger) => (
                Some(ledger.session().identity().to_string()),
                ledger.users().to_vec(),
                ledger.activity().recent().map(|r| r.summary()).collect(),
            ),
            None => (None, Vec::new(), Vec::new()),
        };
        AppSnapshot {
            identity,
            source: self.source.clone(),
            users,
            status: self.status.clone(),
            errors: self.errors.clone(),
            activity,
        }
    }

    /// Authenticate and run the initial load. The ledger only replaces the
    /// locked state once that load succeeded.
    pub async fn login(
        &mut self,
        password: &str,
        identity: Option<&str>,
    ) -> std::result::Result<(), LedgerError> {
        let session = Session::authenticate(password, identity, &self.policy)?;
        let ledger = Ledger::connect(session, self.service.clone()).await?;
        info!(
            identity = ledger.session().identity(),
            users = ledger.users().len(),
            "session started"
        );
        self.status = format!("Loaded {} users", ledger.users().len());
        self.ledger = Some(ledger);
        Ok(())
    }

    pub fn open(
        &self,
        username: &str,
        mode: Mode,
    ) -> std::result::Result<PendingTransaction, LedgerError> {
        match &self.ledger {
            Some(ledger) => ledger.open(username, mode),
            None => Err(LedgerError::Locked),
        }
    }

    pub async fn submit(
        &mut self,
        pending: &PendingTransaction,
    ) -> std::result::Result<(), LedgerError> {
        let Some(ledger) = self.ledger.as_mut() else {
            return Err(LedgerError::Locked);
        };
        let totals = ledger.submit(pending).await?;
        self.status = format!(
            "{} for {} done. Local: {}, Global: {}, Total: {}",
            pending.mode,
            pending.target,
            totals.local,
            totals.global,
            totals.total()
        );
        Ok(())
    }

    pub async fn reload(&mut self) -> std::result::Result<(), LedgerError> {
        let Some(ledger) = self.ledger.as_mut() else {
            return Ok(());
        };
        let count = ledger.load().await?.len();
        self.status = format!("Reloaded {count} users");
        Ok(())
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let backend = LedgerBackend::from_source(&config.source)
        .wrap_err("failed to set up ledger data source")?;
    if backend.is_read_only() {
        warn!("running against a read-only database; changes will not be saved");
    }
    let selectable = if config.identities.requires_selection() {
        config.identities.known_identities()
    } else {
        Vec::new()
    };
    let source = backend.to_string();
    let controller = AppController::new(config.identities, backend, source);
    let mut ui_state = ui::UiState::new(selectable);

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<S: LedgerService + Clone>(
    mut controller: AppController<S>,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    ui::draw(ui_state, &controller.build_snapshot()).wrap_err("initial draw failed")?;
    loop {
        let ev = ui::next_event(ui_state).await?;
        match ev {
            ui::UserEvent::Quit => break,
            ui::UserEvent::Redraw => {}
            ui::UserEvent::Login { password, identity } => {
                ui::login_started(ui_state);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw while loading failed")?;
                match controller.login(&password, identity.as_deref()).await {
                    Ok(()) => ui::enter_dashboard(ui_state),
                    Err(e) => {
                        warn!(error = %e, "login failed");
                        ui::login_failed(ui_state, login_message(&e));
                    }
                }
            }
            ui::UserEvent::Open { username, mode } => match controller.open(&username, mode) {
                Ok(pending) => ui::open_form(ui_state, pending),
                Err(e) => controller.push_error(e.to_string()),
            },
            ui::UserEvent::Submit(pending) => {
                controller.set_status(format!(
                    "{} for {}: Processing...",
                    pending.mode, pending.target
                ));
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw while submitting failed")?;
                match controller.submit(&pending).await {
                    Ok(()) => ui::close_form(ui_state),
                    Err(e) => {
                        error!(error = %e, target = %pending.target, "transaction failed");
                        controller.set_status("Ready");
                        ui::form_failed(ui_state, e.to_string());
                    }
                }
            }
            ui::UserEvent::Reload => {
                controller.set_status("Loading...");
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw while reloading failed")?;
                if let Err(e) = controller.reload().await {
                    warn!(error = %e, "reload failed");
                    controller.set_status("Reload failed");
                    controller.push_error(e.to_string());
                }
            }
        }
        ui::draw(ui_state, &controller.build_snapshot()).wrap_err("draw failed")?;
    }
    Ok(())
}

fn login_message(err: &LedgerError) -> String {
    match err {
        LedgerError::Load(_) => {
            "Could not load data. Check the service URL and sheet permissions.".to_string()
        }
        other => other.to_string(),
    }
}
