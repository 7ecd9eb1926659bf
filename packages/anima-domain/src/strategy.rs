use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::fragment::fold_tag;

pub const BASE_COEFFICIENT: f32 = 2.0;
pub const IMPORTANT_COEFFICIENT: f32 = 2.0;
pub const FAN_OUT_COEFFICIENT: f32 = 1.5;
pub const DIVERSITY_COEFFICIENT: f32 = 1.5;
pub const MIN_CANDIDATE_K: usize = 2;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	Base,
	Important,
	Status,
	Period,
	Special,
	Diversity,
}
impl StepKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Base => "base",
			Self::Important => "important",
			Self::Status => "status",
			Self::Period => "period",
			Self::Special => "special",
			Self::Diversity => "diversity",
		}
	}

	pub fn coefficient(self) -> f32 {
		match self {
			Self::Base => BASE_COEFFICIENT,
			Self::Important => IMPORTANT_COEFFICIENT,
			Self::Status | Self::Period | Self::Special => FAN_OUT_COEFFICIENT,
			Self::Diversity => DIVERSITY_COEFFICIENT,
		}
	}

	/// Structural steps keep candidates down to `min_score - slack`.
	pub fn is_score_exempt(self) -> bool {
		matches!(self, Self::Important | Self::Status | Self::Period | Self::Special)
	}

	/// Steps that issue one sub-query per label.
	pub fn is_per_label(self) -> bool {
		matches!(self, Self::Important | Self::Status | Self::Special)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub enum Step {
	Base { count: usize },
	Important { count: usize, labels: Vec<String> },
	Status { count: usize, labels: Vec<String> },
	Period { count: usize, labels: Vec<String> },
	Special { count: usize, labels: Vec<String> },
	Diversity { count: usize },
}
impl Step {
	pub fn kind(&self) -> StepKind {
		match self {
			Self::Base { .. } => StepKind::Base,
			Self::Important { .. } => StepKind::Important,
			Self::Status { .. } => StepKind::Status,
			Self::Period { .. } => StepKind::Period,
			Self::Special { .. } => StepKind::Special,
			Self::Diversity { .. } => StepKind::Diversity,
		}
	}

	pub fn count(&self) -> usize {
		match self {
			Self::Base { count }
			| Self::Diversity { count }
			| Self::Important { count, .. }
			| Self::Status { count, .. }
			| Self::Period { count, .. }
			| Self::Special { count, .. } => *count,
		}
	}

	pub fn labels(&self) -> &[String] {
		match self {
			Self::Base { .. } | Self::Diversity { .. } => &[],
			Self::Important { labels, .. }
			| Self::Status { labels, .. }
			| Self::Period { labels, .. }
			| Self::Special { labels, .. } => labels.as_slice(),
		}
	}

	/// How many candidates to fetch per query for this step.
	pub fn candidate_k(&self, global_multiplier: f32) -> usize {
		let raw = (self.count() as f32 * global_multiplier * self.kind().coefficient()).ceil();

		if raw.is_finite() && raw > 0.0 {
			(raw as usize).max(MIN_CANDIDATE_K)
		} else {
			MIN_CANDIDATE_K
		}
	}

	/// How many results this step may accept into the final set.
	pub fn accept_limit(&self) -> usize {
		if self.kind().is_per_label() {
			self.count().saturating_mul(self.labels().len())
		} else {
			self.count()
		}
	}

	/// Lowest score this step accepts.
	pub fn score_floor(&self, min_score: f32, exemption_slack: f32) -> f32 {
		if self.kind().is_score_exempt() { min_score - exemption_slack } else { min_score }
	}
}

/// Wire form of a step: `{ "type", "count", "labels", "target_tag" }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawStep {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub count: usize,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub labels: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_tag: Option<String>,
}

impl TryFrom<RawStep> for Step {
	type Error = String;

	fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
		let RawStep { kind, count, labels, target_tag } = raw;
		let mut labels: Vec<String> = labels
			.into_iter()
			.map(|label| label.trim().to_string())
			.filter(|label| !label.is_empty())
			.collect();

		if labels.is_empty()
			&& let Some(tag) = target_tag.map(|tag| tag.trim().to_string())
			&& !tag.is_empty()
		{
			labels.push(tag);
		}

		match kind.trim().to_ascii_lowercase().as_str() {
			"base" => Ok(Self::Base { count }),
			"important" => Ok(Self::Important { count, labels }),
			"status" => Ok(Self::Status { count, labels }),
			"period" => Ok(Self::Period { count, labels }),
			"special" => Ok(Self::Special { count, labels }),
			"diversity" => Ok(Self::Diversity { count }),
			other => Err(format!("Unknown strategy step type: {other}.")),
		}
	}
}

impl From<Step> for RawStep {
	fn from(step: Step) -> Self {
		let kind = step.kind().as_str().to_string();
		let count = step.count();
		let labels = step.labels().to_vec();

		Self { kind, count, labels, target_tag: None }
	}
}

/// Lowercased labels referenced by structural steps, plus the important marker.
pub fn functional_tags(steps: &[Step], important_marker: &str) -> HashSet<String> {
	let mut out = HashSet::new();

	out.insert(fold_tag(important_marker));

	for step in steps {
		if step.kind().is_score_exempt() {
			out.extend(step.labels().iter().map(|label| fold_tag(label)));
		}
	}

	out
}

/// First tag that is not functional, compared case-insensitively.
pub fn detect_vibe_tag(tags: &[String], functional: &HashSet<String>) -> Option<String> {
	tags.iter().find(|tag| !functional.contains(&fold_tag(tag))).cloned()
}
