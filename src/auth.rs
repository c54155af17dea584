use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};
use std::str;
use tide::{Body, Request, Response, StatusCode};

use super::{db, graphql::State};

#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    // absent when the token was issued without the profile scope
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    id_token: String,
}

#[derive(Debug, Serialize)]
struct Session {
    user_id: i32,
    email: String,
    name: String,
}

/// Reads the claims of an OpenID id token. The signature is not checked.
pub fn decode_jwt(token: &str) -> Result<Claims> {
    let parts: Vec<&str> = token.split('.').collect();
    let claims = parts.get(1).ok_or_else(|| anyhow!("malformed token"))?;
    let claims = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('='))?;
    let claims = str::from_utf8(&claims[..])?;
    let claims = serde_json::from_str(claims)?;
    Ok(claims)
}

pub async fn handle_session(mut req: Request<State>) -> tide::Result {
    let NewSession { id_token } = req.body_json().await?;
    let claims =
        decode_jwt(&id_token).map_err(|e| tide::Error::new(StatusCode::BadRequest, e))?;

    let user = db::User::find_or_create(&claims, &req.state().store).await?;
    info!("session started for user {}", user.id);

    let mut response = Response::new(StatusCode::Ok);
    response.set_body(Body::from_json(&Session {
        user_id: user.id,
        email: user.email,
        name: user.name,
    })?);

    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn token(payload: &str) -> String {
        format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn reads_claims() {
        let token = token(r#"{"sub":"1234","email":"stu@example.com","name":"Stu","iat":1}"#);

        let claims = decode_jwt(&token).unwrap();

        assert_eq!(
            (claims.sub.as_str(), claims.email.as_str(), claims.name.as_str()),
            ("1234", "stu@example.com", "Stu")
        );
    }

    #[test_case("no-dots" ; "single segment")]
    #[test_case("a.!!!.c" ; "not base64")]
    #[test_case("a.bm90IGpzb24.c" ; "not json")]
    fn rejects_malformed_tokens(token: &str) {
        assert!(decode_jwt(token).is_err());
    }

    #[test]
    fn name_is_optional() {
        let token = token(r#"{"sub":"1234","email":"stu@example.com"}"#);

        let claims = decode_jwt(&token).unwrap();

        assert_eq!((claims.sub.as_str(), claims.name.as_str()), ("1234", ""));
    }

    #[test]
    fn rejects_missing_claims() {
        assert!(decode_jwt(&token(r#"{"sub":"1234"}"#)).is_err());
    }
}
