use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::model::common::ballot::BallotRejection;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    /// An expected business outcome of the voting flow, reported to the
    /// client with a machine-readable reason.
    #[error(transparent)]
    Rejected(#[from] BallotRejection),
    /// Any other client-caused failure, reported as a bare status.
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        match self {
            // Business rejections are not system errors: log quietly and give
            // the client a body it can branch on.
            Self::Rejected(rejection) => {
                info!("Ballot rejected: {rejection}");
                let status = rejection.status();
                let mut response = Json(rejection).respond_to(req)?;
                response.set_status(status);
                Ok(response)
            }
            Self::Status(status, message) => {
                warn!("{status}: {message}");
                Err(status)
            }
            // Infrastructure failures: surface loudly, reply generically.
            // The voting flow is atomic, so the client may safely retry.
            err => {
                error!("Internal error: {err}");
                Err(Status::InternalServerError)
            }
        }
    }
}
