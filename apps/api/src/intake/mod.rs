// Intake: accepting candidate resumes and job postings into the store.

pub mod handlers;
