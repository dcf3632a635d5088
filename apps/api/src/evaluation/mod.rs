// Candidate evaluation core: skill-gap matching, composite scoring, the
// stage pipeline, and its background execution queue.

pub mod context;
pub mod handlers;
pub mod matcher;
pub mod pipeline;
pub mod queue;
pub mod recommend;
pub mod scorer;
