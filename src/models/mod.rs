pub mod attachment;
pub mod task;
pub mod user;

use lazy_static::lazy_static;
use regex::Regex;

pub use attachment::{Attachment, AttachmentResponse};
pub use task::{
    CreateTaskRequest, NewTask, PageQuery, PatchTaskRequest, PutTaskRequest, Task, TaskChanges,
    TaskPage, TaskResponse,
};
pub use user::{
    LoginRequest, NewUser, RegisterRequest, UpdateProfileRequest, User, UserChanges, UserProfile,
};

lazy_static! {
    // Stricter than validator's `email`: requires a dot in the domain part.
    pub(crate) static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    pub(crate) static ref HAS_LETTER_REGEX: Regex = Regex::new(r"[a-zA-Z]").unwrap();
}
