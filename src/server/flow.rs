use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use serde::Serialize;

/// Every step of one sign-up → sign-in → rotate → replay run.
#[derive(Debug, Serialize)]
pub struct FlowReport {
    pub user_id: UserId,
    pub login: LoginResult,
    pub rotated: AuthTokens,
    /// What a client replaying the first refresh token is told.
    pub replay_rejection: String,
}

/// Drive the whole rotation lifecycle against one service instance.
///
/// The in-memory backends only live as long as the process, so this is the
/// way to exercise them end to end from the command line.
pub async fn run_flow(auth: &dyn AuthService, input: SignUpInput) -> Result<FlowReport, AuthError> {
    let email = input.email.clone();
    let password = input.password.clone();

    let user_id = auth.sign_up(input).await?;
    let login = auth.sign_in(SignInInput { email, password }).await?;
    let refresh1 = login.tokens.refresh_token.0.clone();

    let rotated = auth.refresh_tokens(&refresh1).await?;

    let replay_rejection = match auth.refresh_tokens(&refresh1).await {
        Ok(_) => {
            return Err(AuthError::InternalError(
                "replayed refresh token was accepted".to_string(),
            ));
        }
        Err(AuthError::RefreshDenied) => AuthError::RefreshDenied.public_message().to_string(),
        Err(e) => return Err(e),
    };
    info!(%user_id, "rotation flow completed, replay denied");

    Ok(FlowReport {
        user_id,
        login,
        rotated,
        replay_rejection,
    })
}
