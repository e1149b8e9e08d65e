use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(about = "Sign-in and refresh-token rotation driver")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new user
    SignUp {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Exchange credentials for an access/refresh token pair
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Redeem a refresh token for a new pair
    Refresh {
        #[arg(long)]
        token: String,
    },
    /// Revoke the refresh session of the access token's owner
    SignOut {
        #[arg(long)]
        access_token: String,
    },
    /// Sign up, sign in, rotate once and replay the spent token in one process
    Flow {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
}

impl Command {
    /// Whether the command can complete on its own without state from an earlier run.
    pub fn is_self_contained(&self) -> bool {
        matches!(self, Command::Flow { .. })
    }
}
