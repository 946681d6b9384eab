use log::error;
use miette::Diagnostic;
use rinkdb_scheduler::manager::SchedulerError;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{Request, Response};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::Scheduler(err) => match err {
                SchedulerError::SeasonNotFound(_) | SchedulerError::ConfigNotFound(_) => {
                    Status::NotFound
                }
                SchedulerError::ConfigAlreadyExists(_)
                | SchedulerError::InvalidTransition { .. } => Status::Conflict,
                SchedulerError::InvalidConfig(_) => Status::BadRequest,
                SchedulerError::Db(_) | SchedulerError::Pool(_) => Status::InternalServerError,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("API request failed: {self}");
        }
        let rendered = serde_json::json!({ "error": self.to_string() }).to_string();

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(rendered.len(), std::io::Cursor::new(rendered))
            .ok()
    }
}
