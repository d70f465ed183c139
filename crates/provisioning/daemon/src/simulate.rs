//! Simulation run: submit a burst of random requests and drive them to
//! a settled state with the real background loops

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::server::Server;
use chrono::Utc;
use provisioning_engine::{FieldSchema, FieldType, TemplateDefinition};
use provisioning_types::{
    Actor, Configuration, JobId, JobStatistics, JobStatus, UserId, WorkflowId,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration, Instant};

const USERS: &[&str] = &["alice", "bob", "carol", "dave"];

/// Knobs for a simulation run
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub jobs: usize,
    /// Probability a request omits a required field
    pub invalid_rate: f64,
    /// Probability the owner cancels a job right after submitting it
    pub cancel_rate: f64,
    pub seed: Option<u64>,
    pub settle_timeout: Duration,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            jobs: 20,
            invalid_rate: 0.1,
            cancel_rate: 0.1,
            seed: None,
            settle_timeout: Duration::from_secs(120),
        }
    }
}

/// Summary of a simulation run
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationReport {
    pub submitted: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub activated_now: usize,
    pub scheduled: usize,
    pub statistics: JobStatistics,
}

pub async fn run(mut config: DaemonConfig, options: SimulationOptions) -> DaemonResult<SimulationReport> {
    if config.templates.is_empty() {
        return Err(DaemonError::Config("simulation needs at least one template".into()));
    }
    // Short ticks so the run settles quickly
    config.provisioning.queue_tick_secs = 1;
    config.provisioning.activation_sweep_secs = 1;

    let templates = config.templates.clone();
    let server = Server::new(config)?;
    let orchestrator = server.orchestrator();
    let handles = server.spawn_background();

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut report = SimulationReport {
        submitted: 0,
        rejected: 0,
        cancelled: 0,
        activated_now: 0,
        scheduled: 0,
        statistics: JobStatistics::default(),
    };
    let mut owners: Vec<(JobId, UserId)> = Vec::new();

    for i in 0..options.jobs {
        let Some(template) = templates.choose(&mut rng) else {
            break;
        };
        let user = UserId::new(USERS.choose(&mut rng).copied().unwrap_or("alice"));
        let omit_required = rng.gen_bool(options.invalid_rate.clamp(0.0, 1.0));
        let configuration = random_configuration(template, omit_required, &mut rng);

        match orchestrator
            .start_provisioning(
                user.clone(),
                WorkflowId::new(format!("sim-wf-{}", i)),
                template.id.clone(),
                configuration,
            )
            .await
        {
            Ok(ticket) => {
                report.submitted += 1;
                if rng.gen_bool(options.cancel_rate.clamp(0.0, 1.0))
                    && orchestrator
                        .cancel_job(&ticket.job_id, &Actor::user(user.clone()))
                        .await
                {
                    report.cancelled += 1;
                }
                owners.push((ticket.job_id, user));
            }
            Err(e) if e.is_validation() => {
                tracing::debug!(error = %e, "Simulated request rejected");
                report.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let deadline = Instant::now() + options.settle_timeout;
    wait_for(&server, deadline, |stats| {
        in_pipeline(stats) == 0
    })
    .await?;

    for (job_id, owner) in &owners {
        let actor = Actor::user(owner.clone());
        if rng.gen_bool(0.5) {
            if orchestrator.activate_job(job_id, &actor).await {
                report.activated_now += 1;
            }
        } else {
            let at = Utc::now() + chrono::Duration::seconds(rng.gen_range(1..=3));
            if orchestrator.schedule_activation(job_id, &actor, at).await {
                report.scheduled += 1;
            }
        }
    }

    wait_for(&server, deadline, |stats| {
        stats.count(JobStatus::Scheduled) == 0
    })
    .await?;

    server.stop().await;
    for handle in handles.into_iter().skip(1) {
        handle.await?;
    }

    report.statistics = orchestrator.statistics().await?;
    Ok(report)
}

fn in_pipeline(stats: &JobStatistics) -> usize {
    [
        JobStatus::Pending,
        JobStatus::Validating,
        JobStatus::Provisioning,
        JobStatus::Configuring,
        JobStatus::Testing,
    ]
    .into_iter()
    .map(|status| stats.count(status))
    .sum()
}

async fn wait_for(
    server: &Server,
    deadline: Instant,
    settled: impl Fn(&JobStatistics) -> bool,
) -> DaemonResult<()> {
    loop {
        let stats = server.orchestrator().statistics().await?;
        if settled(&stats) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(DaemonError::Task("simulation did not settle in time".into()));
        }
        sleep(Duration::from_millis(100)).await;
    }
}

/// A configuration that satisfies the template schema, optionally
/// missing one required field
fn random_configuration(
    template: &TemplateDefinition,
    omit_required: bool,
    rng: &mut impl Rng,
) -> Configuration {
    let required: Vec<_> = template.fields.iter().filter(|f| f.required).collect();
    let omitted = if omit_required {
        required.choose(rng).map(|f| f.name.clone())
    } else {
        None
    };

    template
        .fields
        .iter()
        .filter(|field| Some(&field.name) != omitted.as_ref())
        .map(|field| (field.name.clone(), random_value(field, rng)))
        .collect()
}

fn random_value(field: &FieldSchema, rng: &mut impl Rng) -> Value {
    match field.field_type {
        FieldType::Boolean => json!(rng.gen_bool(0.5)),
        FieldType::Integer => {
            let min = field.min.unwrap_or(0.0).ceil() as i64;
            let max = field.max.unwrap_or(100.0).floor() as i64;
            json!(rng.gen_range(min..=max.max(min)))
        }
        FieldType::Number => {
            let min = field.min.unwrap_or(0.0);
            let max = field.max.unwrap_or(100.0).max(min);
            json!(min + (max - min) * rng.gen::<f64>())
        }
        FieldType::String => match field.allowed.choose(rng) {
            Some(value) => json!(value),
            // Two lowercase letters satisfy the region-style patterns
            None if field.pattern.is_some() => json!("us"),
            None => json!(format!("sim-{:08x}", rng.gen::<u32>())),
        },
    }
}
