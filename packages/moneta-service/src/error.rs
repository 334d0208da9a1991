pub type ServiceResult<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("The request must be authenticated.")]
	Unauthenticated,
	#[error("User {email} is not authorized to use this feature.")]
	PermissionDenied { email: String },
	#[error("Invalid request: {message}")]
	InvalidArgument { message: String },
	#[error("Upstream unavailable: {message}")]
	Upstream { message: String },
	#[error("Generation failed: {message}")]
	Generation { message: String },
}
