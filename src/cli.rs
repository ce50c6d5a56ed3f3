use crate::api::{image_file_part, segment};
use crate::auth::{decode_claims, is_token_expired};
use crate::client::{ApiClient, RequestDescriptor};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    ConsultationCreate, ConsultationStatus, ConsultationUpdate, PatientCreate, PractitionerType,
    RegisterRequest, Role, UnreviewedQuery, Urgency,
};
use crate::offline_queue::{OfflineQueue, Submission};
use crate::poller::{DesktopNotifier, IncomingCallWatcher};
use crate::token_storage::TokenStore;
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// DermoAI - command-line client for the dermatology triage service
#[derive(Parser)]
#[command(name = "dermoai")]
#[command(about = "Screen skin lesions, manage consultations and take teleconsultation calls", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (overrides the configuration file)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Keep credentials in memory only for this run
    #[arg(long)]
    pub no_keyring: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Sign in and store the session credentials
    Login(LoginArgs),

    /// Create a new account
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the local session and offline queue state
    Status,

    /// Show the signed-in account
    Whoami,

    /// Manage patients
    #[command(subcommand)]
    Patients(PatientCommands),

    /// Manage consultations
    #[command(subcommand)]
    Consultations(ConsultationCommands),

    /// Quick-scan an image outside any consultation
    Scan(ScanArgs),

    /// Upload an image into a consultation
    Upload(UploadArgs),

    /// List images waiting for practitioner review
    ReviewQueue(ReviewQueueArgs),

    /// List notifications
    Notifications,

    /// Show dashboard statistics for the signed-in role
    Stats,

    /// Watch for incoming teleconsultation requests
    Watch,

    /// Inspect or deliver writes queued while offline
    #[command(subcommand)]
    Queue(QueueCommands),
}

#[derive(Args, Clone)]
pub struct LoginArgs {
    /// Account e-mail (prompted when omitted)
    #[arg(short, long)]
    pub email: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    User,
    Practitioner,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PractitionerTypeArg {
    General,
    Specialist,
}

#[derive(Args, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long, value_enum, default_value = "user")]
    pub role: RoleArg,

    /// Required for practitioners
    #[arg(long, value_enum)]
    pub practitioner_type: Option<PractitionerTypeArg>,

    #[arg(long)]
    pub expertise: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum PatientCommands {
    /// List patients
    List,

    /// Show one patient
    Show { patient_id: String },

    /// Create a patient (queued when offline)
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConsultationCommands {
    /// List consultations
    List,

    /// Show a consultation with its images and reviews
    Show { consultation_id: String },

    /// Open a consultation for a patient
    Open { patient_id: String },

    /// Close a consultation (queued when offline)
    Close { consultation_id: String },
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Image file to scan
    pub file: PathBuf,

    /// Allow the image to be reused for model training
    #[arg(long)]
    pub consent: bool,
}

#[derive(Args, Clone)]
pub struct UploadArgs {
    pub consultation_id: String,

    /// Image file to upload
    pub file: PathBuf,
}

#[derive(Args, Clone)]
pub struct ReviewQueueArgs {
    #[arg(long, default_value = "0")]
    pub skip: u32,

    #[arg(long, default_value = "20")]
    pub limit: u32,
}

#[derive(Subcommand, Clone)]
pub enum QueueCommands {
    /// List queued writes
    List,

    /// Send queued writes now
    Flush,

    /// Drop every queued write
    Clear,
}

/// Everything a command needs
pub struct AppContext {
    pub config: Config,
    pub client: Arc<ApiClient>,
    pub tokens: Arc<dyn TokenStore>,
}

impl AppContext {
    fn open_queue(&self) -> Result<OfflineQueue, AppError> {
        Ok(OfflineQueue::open(&self.config.storage.offline_queue_path())?)
    }
}

pub async fn handle_command(command: Commands, ctx: &AppContext) -> Result<(), AppError> {
    match command {
        Commands::Login(args) => handle_login(args, ctx).await?,
        Commands::Register(args) => handle_register(args, ctx).await?,
        Commands::Logout => {
            ctx.client.logout();
            println!("Signed out.");
        }
        Commands::Status => handle_status(ctx)?,
        Commands::Whoami => {
            let user = ctx.client.current_user().await?;
            println!("{} <{}>", user.name, user.email);
            println!("Role: {}", user.role);
            println!("Active: {}", if user.is_active { "yes" } else { "no" });
        }
        Commands::Patients(command) => handle_patients(command, ctx).await?,
        Commands::Consultations(command) => handle_consultations(command, ctx).await?,
        Commands::Scan(args) => {
            let file = image_file_part(&args.file)?;
            let scan = ctx.client.triage_scan(file, args.consent).await?;
            println!("Prediction: {}", scan.predicted_condition);
            println!("Confidence: {:.1}%", scan.confidence * 100.0);
            println!("Urgency:    {}", scan.urgency);
            if scan.urgency == Urgency::Urgent {
                println!("This result needs prompt attention from a practitioner.");
            }
        }
        Commands::Upload(args) => {
            let file = image_file_part(&args.file)?;
            let upload = ctx
                .client
                .upload_to_consultation(&args.consultation_id, file)
                .await?;
            println!("Uploaded image {}", upload.image_id);
            if let (Some(condition), Some(confidence)) =
                (upload.predicted_condition, upload.confidence)
            {
                println!("Prediction: {} ({:.1}%)", condition, confidence * 100.0);
            }
        }
        Commands::ReviewQueue(args) => {
            let page = ctx
                .client
                .list_unreviewed_images(UnreviewedQuery {
                    skip: args.skip,
                    limit: args.limit,
                })
                .await?;
            println!("{} image(s) awaiting review", page.total);
            for image in page.items {
                println!(
                    "{}  {}  {}",
                    image.image_id,
                    image.predicted_condition.as_deref().unwrap_or("-"),
                    image.uploaded_at
                );
            }
        }
        Commands::Notifications => {
            let notifications = ctx.client.list_notifications().await?;
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for notification in notifications {
                println!(
                    "[{}] {}  {}",
                    notification.status,
                    notification.sent_at.as_deref().unwrap_or("-"),
                    notification.message
                );
            }
        }
        Commands::Stats => handle_stats(ctx).await?,
        Commands::Watch => handle_watch(ctx).await?,
        Commands::Queue(command) => handle_queue(command, ctx).await?,
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String, AppError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(|e| AppError::Generic {
        message: format!("Failed to flush stdout: {}", e),
    })?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Generic {
            message: format!("Failed to read input: {}", e),
        })?;
    Ok(line.trim().to_string())
}

fn prompt_password(prompt: &str) -> Result<SecretString, AppError> {
    let password = rpassword::prompt_password(prompt).map_err(|e| AppError::Generic {
        message: format!("Failed to read password: {}", e),
    })?;
    if password.is_empty() {
        return Err(AppError::Generic {
            message: "Password cannot be empty".to_string(),
        });
    }
    Ok(SecretString::new(password))
}

async fn handle_login(args: LoginArgs, ctx: &AppContext) -> Result<(), AppError> {
    let email = match args.email {
        Some(email) => email,
        None => prompt_line("E-mail: ")?,
    };
    if email.is_empty() {
        return Err(AppError::Generic {
            message: "E-mail cannot be empty".to_string(),
        });
    }
    let password = prompt_password("Password: ")?;

    ctx.client.login(&email, &password).await?;
    let user = ctx.client.current_user().await?;
    println!("Signed in as {} ({}).", user.name, user.role);
    Ok(())
}

async fn handle_register(args: RegisterArgs, ctx: &AppContext) -> Result<(), AppError> {
    let role = match args.role {
        RoleArg::User => Role::User,
        RoleArg::Practitioner => Role::Practitioner,
    };
    let practitioner_type = args.practitioner_type.map(|kind| match kind {
        PractitionerTypeArg::General => PractitionerType::General,
        PractitionerTypeArg::Specialist => PractitionerType::Specialist,
    });
    if role == Role::Practitioner && practitioner_type.is_none() {
        return Err(AppError::Generic {
            message: "--practitioner-type is required when registering a practitioner".to_string(),
        });
    }

    let password = prompt_password("Choose a password: ")?;
    let confirmation = prompt_password("Repeat the password: ")?;
    if password.expose_secret() != confirmation.expose_secret() {
        return Err(AppError::Generic {
            message: "Passwords do not match".to_string(),
        });
    }

    let registration = RegisterRequest {
        name: args.name,
        email: args.email,
        password: password.expose_secret().clone(),
        phone_number: args.phone,
        role,
        practitioner_type,
        expertise: args.expertise,
    };
    let user = ctx.client.register(&registration).await?;

    println!("Account created for {}.", user.email);
    if role == Role::Practitioner {
        println!("Practitioner accounts must be approved by an administrator before use.");
    }
    println!("Run `dermoai login` to sign in.");
    Ok(())
}

fn handle_status(ctx: &AppContext) -> Result<(), AppError> {
    println!("Backend: {}", ctx.config.api.base_url);

    match ctx.tokens.access_token() {
        None => println!("Session: not signed in"),
        Some(token) => {
            let token = token.expose_secret();
            match decode_claims(token) {
                Some(claims) => {
                    println!("Session: signed in as {} ({})", claims.sub, claims.role);
                    let expires = claims
                        .expires_at()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| claims.exp.to_string());
                    if is_token_expired(token) {
                        println!("Access token expired at {}; it will be refreshed on the next request.", expires);
                    } else {
                        println!("Access token valid until {}", expires);
                    }
                }
                None => println!("Session: signed in (token details unavailable)"),
            }
            if ctx.tokens.refresh_token().is_none() {
                println!("No refresh token stored; you will need to sign in again when the session expires.");
            }
        }
    }

    let queue = ctx.open_queue()?;
    let queued = queue.len()?;
    match queue.oldest()? {
        Some(oldest) if queued > 0 => {
            println!("Offline queue: {} write(s), oldest from {}", queued, oldest.to_rfc3339())
        }
        _ => println!("Offline queue: empty"),
    }
    Ok(())
}

async fn handle_patients(command: PatientCommands, ctx: &AppContext) -> Result<(), AppError> {
    match command {
        PatientCommands::List => {
            let patients = ctx.client.list_patients().await?;
            if patients.is_empty() {
                println!("No patients.");
            }
            for patient in patients {
                println!(
                    "{}  {}  {}",
                    patient.patient_id,
                    patient.name,
                    patient.phone_number.as_deref().unwrap_or("-")
                );
            }
        }
        PatientCommands::Show { patient_id } => {
            let patient = ctx.client.get_patient(&patient_id).await?;
            println!("{} ({})", patient.name, patient.patient_id);
            println!("Phone: {}", patient.phone_number.as_deref().unwrap_or("-"));
            println!(
                "Linked account: {}",
                patient.user_id.as_deref().unwrap_or("none")
            );
            println!("Created: {}", patient.created_at);
        }
        PatientCommands::Create { name, phone } => {
            let patient = PatientCreate {
                name,
                phone_number: phone,
                user_id: None,
            };
            let descriptor = RequestDescriptor::post("/api/patients/").json(&patient)?;
            let queue = ctx.open_queue()?;
            match queue.submit_or_enqueue(ctx.client.as_ref(), descriptor).await? {
                Submission::Sent(_) => println!("Patient created."),
                Submission::Queued(id) => {
                    println!("Backend unreachable; patient queued as #{} and will be sent later.", id)
                }
            }
        }
    }
    Ok(())
}

async fn handle_consultations(
    command: ConsultationCommands,
    ctx: &AppContext,
) -> Result<(), AppError> {
    match command {
        ConsultationCommands::List => {
            let consultations = ctx.client.list_consultations().await?;
            if consultations.is_empty() {
                println!("No consultations.");
            }
            for consultation in consultations {
                println!(
                    "{}  {:<9}  {:<10}  {}",
                    consultation.consultation_id,
                    consultation.status.to_string(),
                    consultation
                        .urgency
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    consultation.final_predicted_condition.as_deref().unwrap_or("-")
                );
            }
        }
        ConsultationCommands::Show { consultation_id } => {
            let consultation = ctx.client.get_consultation(&consultation_id).await?;
            let images = ctx.client.list_consultation_images(&consultation_id).await?;
            let reviews = ctx
                .client
                .list_reviews_for_consultation(&consultation_id)
                .await?;

            println!("Consultation {}", consultation.consultation_id);
            println!("Patient: {}", consultation.patient_id);
            println!("Status:  {}", consultation.status);
            if let Some(condition) = consultation.final_predicted_condition {
                println!(
                    "Prediction: {} ({:.1}%)",
                    condition,
                    consultation.final_confidence.unwrap_or(0.0) * 100.0
                );
            }
            println!("Images: {}", images.len());
            for image in images {
                println!(
                    "  {}  {}",
                    image.image_id,
                    image
                        .reviewed_label
                        .or(image.predicted_condition)
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            println!("Reviews: {}", reviews.len());
            for review in reviews {
                let marker = if review.is_final { " (final)" } else { "" };
                println!("  {}{}", review.diagnosis, marker);
            }
        }
        ConsultationCommands::Open { patient_id } => {
            let consultation = ctx
                .client
                .create_consultation(&ConsultationCreate { patient_id })
                .await?;
            println!("Opened consultation {}", consultation.consultation_id);
        }
        ConsultationCommands::Close { consultation_id } => {
            let update = ConsultationUpdate {
                status: Some(ConsultationStatus::Closed),
            };
            let path = format!("/api/consultations/{}", segment(&consultation_id));
            let descriptor = RequestDescriptor::put(path).json(&update)?;
            let queue = ctx.open_queue()?;
            match queue.submit_or_enqueue(ctx.client.as_ref(), descriptor).await? {
                Submission::Sent(_) => println!("Consultation closed."),
                Submission::Queued(id) => println!(
                    "Backend unreachable; close queued as #{} and will be sent later.",
                    id
                ),
            }
        }
    }
    Ok(())
}

async fn handle_stats(ctx: &AppContext) -> Result<(), AppError> {
    let role = ctx
        .tokens
        .access_token()
        .and_then(|token| decode_claims(token.expose_secret()))
        .map(|claims| claims.role);

    match role.as_deref() {
        Some("ADMIN") => {
            let stats = ctx.client.admin_stats().await?;
            println!("Users:          {}", stats.total_users);
            println!("Practitioners:  {}", stats.total_practitioners);
            println!("Specialists:    {}", stats.total_specialists);
            println!("Patients:       {}", stats.total_patients);
            println!("Consultations:  {}", stats.total_consultations);
            println!("Images:         {}", stats.total_images);
            println!("Pending approvals: {}", stats.pending_approvals);
            for activity in stats.recent_activity {
                println!("  {}  {}  {}", activity.at, activity.kind, activity.summary);
            }
        }
        Some("PRACTITIONER") => {
            let stats = ctx.client.practitioner_stats().await?;
            println!("My reviews:            {}", stats.my_reviews);
            println!("Pending consultations: {}", stats.pending_consultations);
            println!("Urgent cases:          {}", stats.urgent_cases);
        }
        _ => {
            let stats = ctx.client.user_stats().await?;
            println!("My scans:         {}", stats.my_scans);
            println!("My consultations: {}", stats.my_consultations);
            println!("Pending results:  {}", stats.pending_results);
            println!("Urgent alerts:    {}", stats.urgent_alerts);
        }
    }
    Ok(())
}

async fn handle_watch(ctx: &AppContext) -> Result<(), AppError> {
    if !ctx.client.is_authenticated() {
        return Err(AppError::Generic {
            message: "Not signed in. Run `dermoai login` first.".to_string(),
        });
    }

    let mut watcher = IncomingCallWatcher::new(
        ctx.client.clone(),
        Box::new(DesktopNotifier),
        &ctx.config.watch,
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    let watcher_task = tokio::spawn(async move { watcher.run_with_shutdown(shutdown_rx).await });
    println!("Watching for incoming teleconsultations. Press Ctrl+C to stop.");

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, attempting graceful shutdown...");
            let _ = shutdown_tx.send(());
        }
        _ = watcher_closed(&shutdown_tx) => {}
    }

    match tokio::time::timeout(std::time::Duration::from_secs(5), watcher_task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(e)) => Err(AppError::Generic {
            message: format!("Watcher task failed: {}", e),
        }),
        Err(_) => {
            tracing::error!("Watcher did not stop within timeout, forcing shutdown");
            Ok(())
        }
    }
}

/// Resolves once the watcher has dropped its shutdown receiver.
async fn watcher_closed(shutdown_tx: &tokio::sync::broadcast::Sender<()>) {
    while shutdown_tx.receiver_count() > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn handle_queue(command: QueueCommands, ctx: &AppContext) -> Result<(), AppError> {
    let queue = ctx.open_queue()?;
    match command {
        QueueCommands::List => {
            let pending = queue.pending()?;
            if pending.is_empty() {
                println!("Offline queue is empty.");
            }
            for entry in pending {
                println!(
                    "#{}  {}  {} {}",
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.method,
                    entry.path
                );
            }
        }
        QueueCommands::Flush => {
            let summary = queue.replay(ctx.client.as_ref()).await?;
            println!(
                "Sent {}, rejected {}, still queued {}.",
                summary.sent, summary.rejected, summary.remaining
            );
        }
        QueueCommands::Clear => {
            let removed = queue.clear()?;
            println!("Removed {} queued write(s).", removed);
        }
    }
    Ok(())
}
