use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use tracing::{info_span, instrument, warn, Instrument};

use super::{AuthError, CallerIdentity, IdentityProvider};

/// Resolves access tokens issued by a Cognito user pool via `GetUser`
pub struct CognitoIdentityProvider {
    client: CognitoClient,
}

impl CognitoIdentityProvider {
    pub fn new(client: CognitoClient) -> Self {
        Self { client }
    }
}

/// Pull the `email` attribute out of a user's attribute list
pub(crate) fn email_from_attributes(attributes: &[AttributeType]) -> Option<String> {
    attributes
        .iter()
        .find(|attribute| attribute.name() == "email")
        .and_then(|attribute| attribute.value())
        .filter(|email| !email.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let span = info_span!(
            "CognitoIdentityProvider",
            "aws.service" = "CognitoIdentityProvider",
            "aws.operation" = "GetUser",
            "otel.kind" = "client",
            "rpc.system" = "aws-api",
            "rpc.method" = "GetUser",
        );

        let output = self
            .client
            .get_user()
            .access_token(token)
            .send()
            .instrument(span)
            .await
            .map_err(|e| {
                let rejected = e.as_service_error().map_or(false, |err| {
                    err.is_not_authorized_exception() || err.is_user_not_found_exception()
                });
                if rejected {
                    AuthError::InvalidToken
                } else {
                    warn!(error = %e, "Cognito GetUser failed");
                    AuthError::Provider {
                        message: e.to_string(),
                    }
                }
            })?;

        let email =
            email_from_attributes(output.user_attributes()).ok_or(AuthError::InvalidToken)?;

        Ok(CallerIdentity { email })
    }
}
