use easeread_auth::application_port::*;
use easeread_auth::logger::*;
use easeread_auth::server::*;
use easeread_auth::settings::*;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(server: &Server, command: Command) -> anyhow::Result<()> {
    let auth = &server.auth_service;
    let result = match command {
        Command::SignUp {
            username,
            email,
            name,
            password,
        } => {
            let input = SignUpInput {
                username,
                email,
                name,
                password,
            };
            auth.sign_up(input)
                .await
                .map(|user_id| serde_json::json!({ "user_id": user_id }))
        }
        Command::SignIn { email, password } => auth
            .sign_in(SignInInput { email, password })
            .await
            .map(|login| serde_json::json!(login)),
        Command::Refresh { token } => auth
            .refresh_tokens(&token)
            .await
            .map(|tokens| serde_json::json!(tokens)),
        Command::SignOut { access_token } => {
            let signed_out = async {
                let user_id = auth.verify_token(&access_token).await?;
                auth.sign_out(user_id).await
            };
            signed_out
                .await
                .map(|_| serde_json::json!({ "message": "Sign out successful" }))
        }
        Command::Flow {
            username,
            email,
            name,
            password,
        } => {
            let input = SignUpInput {
                username,
                email,
                name,
                password,
            };
            run_flow(auth.as_ref(), input)
                .await
                .map(|report| serde_json::json!(report))
        }
    };

    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            warn!(error = %e, "request failed");
            Err(anyhow::anyhow!(e.public_message()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let server = Server::try_new(&project_settings).await?;
    if server.is_ephemeral() && !cli.command.is_self_contained() {
        warn!("memory backends do not outlive this process, use `flow` to run a full rotation");
    }

    let outcome = tokio::select! {
        r = run(&server, cli.command) => r,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    outcome
}
