//! Journey templates and the weighted selection table.
//!
//! A journey is an ordered sequence of HTTP calls simulating one user
//! action. Journeys are immutable templates; the scheduler picks one per
//! tick through a data-driven table of `(weight, journey)` pairs whose
//! weights sum to exactly 100.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// One of the demo service endpoints a journey step can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /` service info.
    Root,
    /// `GET /data` sample payload.
    Data,
    /// `GET /error` deterministic failure.
    Error,
}

impl Endpoint {
    /// URL path of the endpoint.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Data => "/data",
            Self::Error => "/error",
        }
    }

    /// The status the endpoint deliberately returns. For `/error` the
    /// induced 500 is the expected outcome, not a failure.
    #[must_use]
    pub fn expected_status(self) -> u16 {
        match self {
            Self::Root | Self::Data => 200,
            Self::Error => 500,
        }
    }
}

/// A named service the generator drives.
#[derive(Debug, Clone)]
pub struct ServiceTarget {
    /// Logical name used in journey names and reports.
    pub name: String,
    /// Base URL of the service.
    pub base_url: Url,
}

/// Errors parsing the service target list.
#[derive(Debug, Error)]
pub enum TargetParseError {
    /// An entry is not of the form `name=url`.
    #[error("expected name=url, got {0:?}")]
    MissingSeparator(String),

    /// An entry's URL does not parse.
    #[error("invalid url for service {name:?}: {source}")]
    InvalidUrl {
        /// The service name of the offending entry.
        name: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
}

impl ServiceTarget {
    /// Creates a service target.
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            base_url,
        }
    }

    /// Parses a comma-separated list of `name=url` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry lacks the `=` separator or its URL is
    /// invalid.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, TargetParseError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (name, url) = entry
                    .split_once('=')
                    .ok_or_else(|| TargetParseError::MissingSeparator(entry.to_string()))?;
                let base_url = Url::parse(url).map_err(|source| TargetParseError::InvalidUrl {
                    name: name.to_string(),
                    source,
                })?;
                Ok(Self::new(name, base_url))
            })
            .collect()
    }
}

/// One HTTP call within a journey.
#[derive(Debug, Clone)]
pub struct JourneyStep {
    /// Logical name of the target service.
    pub service: String,
    /// Fully resolved request URL.
    pub url: Url,
    /// Status classified as the successful outcome for this call.
    pub expected_status: u16,
    /// Pause before the next call in the same journey.
    pub think_time: Duration,
}

impl JourneyStep {
    fn new(
        target: &ServiceTarget,
        endpoint: Endpoint,
        think_time: Duration,
    ) -> Result<Self, CatalogError> {
        let url = target
            .base_url
            .join(endpoint.path())
            .map_err(CatalogError::InvalidStepUrl)?;
        Ok(Self {
            service: target.name.clone(),
            url,
            expected_status: endpoint.expected_status(),
            think_time,
        })
    }
}

/// How a journey's steps are materialized per execution.
#[derive(Debug, Clone)]
enum Plan {
    /// All steps, strictly in order.
    Sequence(Vec<JourneyStep>),
    /// Exactly one step, picked uniformly from the candidates.
    PickOne(Vec<JourneyStep>),
}

/// An immutable journey template.
#[derive(Debug, Clone)]
pub struct Journey {
    /// Journey name, used for spans and reporting.
    pub name: String,
    plan: Plan,
}

impl Journey {
    /// Creates a journey that runs all steps in order.
    #[must_use]
    pub fn sequence(name: impl Into<String>, steps: Vec<JourneyStep>) -> Self {
        Self {
            name: name.into(),
            plan: Plan::Sequence(steps),
        }
    }

    /// Creates a journey that runs a single step picked uniformly from the
    /// candidates at execution time.
    #[must_use]
    pub fn pick_one(name: impl Into<String>, candidates: Vec<JourneyStep>) -> Self {
        Self {
            name: name.into(),
            plan: Plan::PickOne(candidates),
        }
    }

    /// Materializes the steps for one execution.
    #[must_use]
    pub fn resolve(&self, rng: &mut impl Rng) -> Vec<JourneyStep> {
        match &self.plan {
            Plan::Sequence(steps) => steps.clone(),
            Plan::PickOne(candidates) => {
                if candidates.is_empty() {
                    Vec::new()
                } else {
                    let index = rng.gen_range(0..candidates.len());
                    vec![candidates[index].clone()]
                }
            }
        }
    }
}

/// A journey with its selection weight.
#[derive(Debug, Clone)]
pub struct WeightedJourney {
    /// Selection weight in percent.
    pub weight: u8,
    /// The journey template.
    pub journey: Journey,
}

/// Errors building the journey catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The weighted table is defined for exactly three services.
    #[error("the journey catalog requires exactly 3 services, got {0}")]
    WrongServiceCount(usize),

    /// A step URL could not be resolved against its service base URL.
    #[error("invalid step url: {0}")]
    InvalidStepUrl(#[source] url::ParseError),
}

/// Builds the static weighted journey table for the given services.
///
/// The weights are a fixed configuration summing to exactly 100:
/// dashboard load 25, data fetch 20, one heavy-load journey of 10 per
/// service, single error 5, multi-service error 5, random single call 15.
///
/// # Errors
///
/// Returns an error unless exactly three services are supplied (the weight
/// table is defined for that topology), or if a step URL cannot be built.
pub fn catalog(services: &[ServiceTarget]) -> Result<Vec<WeightedJourney>, CatalogError> {
    if services.len() != 3 {
        return Err(CatalogError::WrongServiceCount(services.len()));
    }

    let dashboard_pause = Duration::from_millis(100);
    let fetch_pause = Duration::from_millis(150);
    let heavy_pause = Duration::from_millis(25);
    let error_pause = Duration::from_millis(50);

    let mut table = Vec::new();

    let dashboard: Vec<JourneyStep> = services
        .iter()
        .map(|svc| JourneyStep::new(svc, Endpoint::Root, dashboard_pause))
        .collect::<Result<_, _>>()?;
    table.push(WeightedJourney {
        weight: 25,
        journey: Journey::sequence("dashboard_load", dashboard),
    });

    let fetch: Vec<JourneyStep> = services
        .iter()
        .map(|svc| JourneyStep::new(svc, Endpoint::Data, fetch_pause))
        .collect::<Result<_, _>>()?;
    table.push(WeightedJourney {
        weight: 20,
        journey: Journey::sequence("data_fetch", fetch),
    });

    for svc in services {
        let bursts = (0..3)
            .map(|_| JourneyStep::new(svc, Endpoint::Data, heavy_pause))
            .collect::<Result<_, _>>()?;
        table.push(WeightedJourney {
            weight: 10,
            journey: Journey::sequence(format!("heavy_load_{}", svc.name), bursts),
        });
    }

    table.push(WeightedJourney {
        weight: 5,
        journey: Journey::sequence(
            "single_error",
            vec![JourneyStep::new(&services[1], Endpoint::Error, Duration::ZERO)?],
        ),
    });

    let all_errors: Vec<JourneyStep> = services
        .iter()
        .map(|svc| JourneyStep::new(svc, Endpoint::Error, error_pause))
        .collect::<Result<_, _>>()?;
    table.push(WeightedJourney {
        weight: 5,
        journey: Journey::sequence("multi_service_error", all_errors),
    });

    let mut singles = Vec::new();
    for svc in services {
        for endpoint in [Endpoint::Root, Endpoint::Data, Endpoint::Error] {
            singles.push(JourneyStep::new(svc, endpoint, Duration::ZERO)?);
        }
    }
    table.push(WeightedJourney {
        weight: 15,
        journey: Journey::pick_one("random_single_call", singles),
    });

    debug_assert_eq!(total_weight(&table), 100);
    Ok(table)
}

/// Sum of the table's weights.
#[must_use]
pub fn total_weight(table: &[WeightedJourney]) -> u32 {
    table.iter().map(|entry| u32::from(entry.weight)).sum()
}

/// Selects a journey via a uniform draw in `[0, total_weight)` walked
/// through the cumulative table.
///
/// # Panics
///
/// Panics if the table is empty.
#[must_use]
pub fn select<'a>(table: &'a [WeightedJourney], rng: &mut impl Rng) -> &'a Journey {
    assert!(!table.is_empty(), "journey table must not be empty");

    let roll = rng.gen_range(0..total_weight(table));
    let mut cumulative = 0;
    for entry in table {
        cumulative += u32::from(entry.weight);
        if roll < cumulative {
            return &entry.journey;
        }
    }
    // Unreachable: the roll is strictly below the summed weights.
    &table[table.len() - 1].journey
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_services() -> Vec<ServiceTarget> {
        ServiceTarget::parse_list(
            "alpha=http://localhost:8001,beta=http://localhost:8002,gamma=http://localhost:8003",
        )
        .unwrap()
    }

    #[test]
    fn test_parse_list() {
        let services = test_services();

        assert_eq!(services.len(), 3);
        assert_eq!(services[0].name, "alpha");
        assert_eq!(services[0].base_url.as_str(), "http://localhost:8001/");
    }

    #[test]
    fn test_parse_list_rejects_missing_separator() {
        let result = ServiceTarget::parse_list("alpha-http://localhost:8001");
        assert!(matches!(result, Err(TargetParseError::MissingSeparator(_))));
    }

    #[test]
    fn test_parse_list_rejects_bad_url() {
        let result = ServiceTarget::parse_list("alpha=not a url");
        assert!(matches!(result, Err(TargetParseError::InvalidUrl { .. })));
    }

    #[test]
    fn test_endpoint_expected_statuses() {
        assert_eq!(Endpoint::Root.expected_status(), 200);
        assert_eq!(Endpoint::Data.expected_status(), 200);
        assert_eq!(Endpoint::Error.expected_status(), 500);
    }

    #[test]
    fn test_catalog_weights_sum_to_100() {
        let table = catalog(&test_services()).unwrap();
        assert_eq!(total_weight(&table), 100);
    }

    #[test]
    fn test_catalog_requires_three_services() {
        let two = &test_services()[..2];
        assert!(matches!(
            catalog(two),
            Err(CatalogError::WrongServiceCount(2))
        ));
    }

    #[test]
    fn test_catalog_journey_names() {
        let table = catalog(&test_services()).unwrap();
        let names: Vec<&str> = table.iter().map(|e| e.journey.name.as_str()).collect();

        assert!(names.contains(&"dashboard_load"));
        assert!(names.contains(&"data_fetch"));
        assert!(names.contains(&"heavy_load_alpha"));
        assert!(names.contains(&"heavy_load_beta"));
        assert!(names.contains(&"heavy_load_gamma"));
        assert!(names.contains(&"single_error"));
        assert!(names.contains(&"multi_service_error"));
        assert!(names.contains(&"random_single_call"));
    }

    #[test]
    fn test_sequence_resolve_preserves_order() {
        let table = catalog(&test_services()).unwrap();
        let dashboard = &table[0].journey;
        let mut rng = rand::thread_rng();

        let steps = dashboard.resolve(&mut rng);

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].service, "alpha");
        assert_eq!(steps[1].service, "beta");
        assert_eq!(steps[2].service, "gamma");
    }

    #[test]
    fn test_pick_one_resolves_single_step() {
        let table = catalog(&test_services()).unwrap();
        let random_single = &table
            .iter()
            .find(|e| e.journey.name == "random_single_call")
            .unwrap()
            .journey;
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            assert_eq!(random_single.resolve(&mut rng).len(), 1);
        }
    }

    #[test]
    fn test_error_steps_expect_500() {
        let table = catalog(&test_services()).unwrap();
        let multi_error = &table
            .iter()
            .find(|e| e.journey.name == "multi_service_error")
            .unwrap()
            .journey;

        let steps = multi_error.resolve(&mut rand::thread_rng());
        assert!(steps.iter().all(|s| s.expected_status == 500));
        assert!(steps.iter().all(|s| s.url.path() == "/error"));
    }

    #[test]
    fn test_selection_matches_weights_over_many_draws() {
        let table = catalog(&test_services()).unwrap();
        let mut rng = rand::thread_rng();
        let draws = 10_000;

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..draws {
            let journey = select(&table, &mut rng);
            *counts.entry(journey.name.clone()).or_default() += 1;
        }

        // Each journey's observed share must be within 3 percentage points
        // of its configured weight.
        for entry in &table {
            let observed = f64::from(*counts.get(&entry.journey.name).unwrap_or(&0));
            let share = observed / f64::from(draws) * 100.0;
            let expected = f64::from(entry.weight);
            assert!(
                (share - expected).abs() <= 3.0,
                "journey {} observed {share:.1}% vs configured {expected}%",
                entry.journey.name
            );
        }
    }
}
