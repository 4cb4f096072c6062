mod common;
mod procedure;
mod scope;
mod submission;
