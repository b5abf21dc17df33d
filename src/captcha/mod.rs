//! Server-side verification of challenge tokens
//!
//! The intake endpoint never trusts a token on its own: it forwards the token,
//! together with the server-held secret, to the hCaptcha `siteverify`
//! endpoint and only proceeds on `success: true`.

mod verifier;

pub use verifier::{ChallengeVerifier, HcaptchaVerifier, Verdict, VerifyError};
