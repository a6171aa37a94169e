pub mod proving_job;
