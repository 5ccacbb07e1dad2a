//! Campus Client - command-line front-end
//!
//! Drives the same data layer a GUI would: sign in, read cached lists,
//! write notes and tail a live socket scope.

use anyhow::{bail, Context};
use campus_client::hooks;
use campus_client::{logging, ClientConfig, ClientContext, QueryState};
use campus_shared::{ApiError, CourseFilter, NewNote, NoteFilter, MESSAGE_EVENT};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Command-line client for the campus learning platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(short, long, env = "CAMPUS_EMAIL")]
        email: String,
        #[arg(short, long, env = "CAMPUS_PASSWORD")]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Course catalogue
    #[command(subcommand)]
    Courses(CourseCommands),

    /// Personal notes
    #[command(subcommand)]
    Notes(NoteCommands),

    /// Notifications for the signed-in user
    Notifications {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Print frames from a live socket scope until interrupted
    Listen {
        /// Scope to join, e.g. a course id
        scope: String,
    },
}

#[derive(Debug, Subcommand)]
enum CourseCommands {
    /// List courses
    List {
        /// Only public courses
        #[arg(long)]
        public: bool,
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Courses the signed-in user is enrolled in
    Mine,

    /// Enroll in a course
    Enroll { id: Uuid },
}

#[derive(Debug, Subcommand)]
enum NoteCommands {
    /// List notes
    List {
        #[arg(long)]
        course: Option<Uuid>,
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Create a note
    Create {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
        #[arg(long)]
        course: Option<Uuid>,
        #[arg(short = 'g', long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a note
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("invalid configuration")?;
    let ctx = ClientContext::new(config);
    if let Some(session) = ctx.restore_session() {
        campus_client::log_debug!("restored session for {}", session.user.email);
    }

    match cli.command {
        Command::Login { email, password } => {
            let session = ctx.sign_in(&email, &password).await?;
            println!("Signed in as {}", session.user.email);
        }
        Command::Logout => {
            ctx.sign_out().await?;
            println!("Signed out");
        }
        Command::Whoami => match ctx.auth.user() {
            Some(user) => print_json(&user)?,
            None => bail!("not signed in"),
        },
        Command::Courses(cmd) => run_courses(&ctx, cmd).await?,
        Command::Notes(cmd) => run_notes(&ctx, cmd).await?,
        Command::Notifications { unread } => {
            print_state(hooks::use_notifications(&ctx, unread).await)?;
        }
        Command::Listen { scope } => listen(&ctx, &scope).await?,
    }

    Ok(())
}

async fn run_courses(ctx: &ClientContext, cmd: CourseCommands) -> anyhow::Result<()> {
    match cmd {
        CourseCommands::List { public, search } => {
            let filter = CourseFilter {
                is_public: public.then_some(true),
                search,
                ..Default::default()
            };
            print_state(hooks::use_courses(ctx, filter).await)
        }
        CourseCommands::Mine => print_state(hooks::use_my_courses(ctx).await),
        CourseCommands::Enroll { id } => {
            let enrollment = hooks::enroll(ctx, id).await?;
            print_json(&enrollment)
        }
    }
}

async fn run_notes(ctx: &ClientContext, cmd: NoteCommands) -> anyhow::Result<()> {
    match cmd {
        NoteCommands::List { course, tag } => {
            let filter = NoteFilter { course_id: course, tag };
            print_state(hooks::use_notes(ctx, filter).await)
        }
        NoteCommands::Create {
            title,
            content,
            course,
            tags,
        } => {
            let note = NewNote {
                title,
                content,
                course_id: course,
                tags,
            };
            print_json(&hooks::create_note(ctx, &note).await?)
        }
        NoteCommands::Delete { id } => {
            hooks::delete_note(ctx, id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

async fn listen(ctx: &ClientContext, scope: &str) -> anyhow::Result<()> {
    let Some(socket) = ctx.socket(scope) else {
        bail!("live updates need a signed-in session and CAMPUS_ENABLE_CHAT=true");
    };

    socket.on(MESSAGE_EVENT, |frame| match serde_json::to_string(frame) {
        Ok(line) => println!("{}", line),
        Err(e) => campus_client::log_warn!("unprintable frame: {}", e),
    });
    socket.connect();

    tokio::signal::ctrl_c().await?;
    socket.disconnect();
    Ok(())
}

fn print_state<T: Serialize>(state: QueryState<T>) -> anyhow::Result<()> {
    if let Some(error) = state.error {
        return Err(describe(error));
    }
    match state.data {
        Some(data) => print_json(&data),
        None => bail!("no data"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe(error: ApiError) -> anyhow::Error {
    anyhow::anyhow!("{}", error.user_message())
}
