/// Process and host identity.
pub mod sys_info;
