//! Explanation synthesizer. Merges attribution and competitor context
//! with an external narrative collaborator.
//!
//! Sources are tried in order: `Collaborator`, then `Template`. The
//! collaborator is optional, runs behind a timeout, and must answer with
//! a JSON object `{summary, key_factors, recommended_actions}`. Anything
//! else falls through to the deterministic template.

use crate::{
    attribution::AttributionResult,
    competitor::CompetitorGap,
    config::NarrativeConfig,
    features::CustomerFeatures,
    types::RiskTier,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_RECOMMENDATION: &str = "Review customer engagement history manually.";
pub const TEMPLATE_KEY_FACTOR:    &str = "Manual review required";
pub const TEMPLATE_ACTION:        &str = "Contact customer service";

const ANALYST_SYSTEM_PROMPT: &str = "You are an expert Customer Retention Analyst for a retail chain. \
Your job is to analyze customer data and explain WHY a customer is at risk of churning in simple, \
business-friendly language. You also provide actionable recommendations. Output ONLY valid JSON.";

// ── Collaborator contract ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativePrompt {
    pub system:      String,
    pub user:        String,
    pub temperature: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NarrativeError {
    #[error("narrative service unavailable: {0}")]
    Unavailable(String),

    #[error("narrative request failed: {0}")]
    Request(String),

    #[error("narrative request timed out after {0} ms")]
    Timeout(u64),

    #[error("malformed narrative response: {0}")]
    Malformed(String),
}

/// Prompt in, raw JSON text out. May block; always called behind a timeout.
pub trait NarrativeGenerator: Send + Sync {
    fn generate(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError>;
}

#[derive(Debug, Deserialize)]
struct NarrativeResponse {
    summary:             Option<String>,
    #[serde(default)]
    key_factors:         Vec<String>,
    #[serde(default)]
    recommended_actions: Vec<String>,
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Collaborator,
    Template,
}

pub const NARRATIVE_SOURCES: [NarrativeSource; 2] = [NarrativeSource::Collaborator, NarrativeSource::Template];

/// Always fully populated: every list has at least one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary:             String,
    pub key_factors:         Vec<String>,
    pub recommended_actions: Vec<String>,
    pub source:              NarrativeSource,
}

/// Everything the synthesizer needs about one prediction.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationRequest<'a> {
    pub features:    &'a CustomerFeatures,
    pub probability: f64,
    pub tier:        RiskTier,
    pub attribution: &'a AttributionResult,
    /// Present only when competitive risk was flagged.
    pub competitor:  Option<&'a CompetitorGap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachDraft {
    pub subject_line:      String,
    pub message_body:      String,
    pub channel_optimized: String,
}

// ── Synthesizer ──────────────────────────────────────────────────────────────

pub struct ExplanationSynthesizer {
    generator: Option<Arc<dyn NarrativeGenerator>>,
    config:    NarrativeConfig,
}

impl ExplanationSynthesizer {
    pub fn new(generator: Option<Arc<dyn NarrativeGenerator>>, config: NarrativeConfig) -> Self {
        if generator.is_none() {
            log::warn!("narrative: no generator configured, explanations will use the template");
        }
        Self { generator, config }
    }

    pub fn explain(&self, req: &ExplanationRequest<'_>) -> Explanation {
        let mut explanation = None;
        for source in NARRATIVE_SOURCES {
            let attempt = match source {
                NarrativeSource::Collaborator => self.from_collaborator(req),
                NarrativeSource::Template     => Ok(template_explanation(req)),
            };
            match attempt {
                Ok(e) => {
                    explanation = Some(e);
                    break;
                }
                Err(e) => log::warn!(
                    "narrative: {:?} failed for {}: {e}; falling back",
                    source, req.features.customer_id,
                ),
            }
        }
        let explanation = explanation.unwrap_or_else(|| template_explanation(req));
        finalize(explanation, req)
    }

    fn from_collaborator(&self, req: &ExplanationRequest<'_>) -> Result<Explanation, NarrativeError> {
        let generator = self.generator.clone()
            .ok_or_else(|| NarrativeError::Unavailable("no generator configured".into()))?;
        let prompt = build_prompt(req, &self.config);
        let raw = call_with_timeout(generator, prompt, self.config.timeout_ms)?;
        parse_response(&raw)
    }

    /// Draft a personalised retention message for a proposed intervention.
    pub fn draft_outreach(
        &self,
        features: &CustomerFeatures,
        intervention_type: &str,
        details: &str,
    ) -> OutreachDraft {
        let brand = &self.config.brand;
        let Some(generator) = self.generator.clone() else {
            return OutreachDraft {
                subject_line:      "Special offer for you".into(),
                message_body:      format!("We miss you at {brand}. Check out our latest deals!"),
                channel_optimized: "Email".into(),
            };
        };

        let prompt = build_outreach_prompt(features, intervention_type, details, &self.config);
        let draft = call_with_timeout(generator, prompt, self.config.timeout_ms).and_then(|raw| {
            serde_json::from_str::<OutreachDraft>(&raw)
                .map_err(|e| NarrativeError::Malformed(e.to_string()))
        });

        match draft {
            Ok(d) => d,
            Err(e) => {
                log::error!("narrative: outreach generation failed for {}: {e}", features.customer_id);
                OutreachDraft {
                    subject_line:      format!("Exclusive {brand} Offer for you!"),
                    message_body:      format!(
                        "We've got something special for your next {} shop. See you soon!",
                        features.primary_category
                    ),
                    channel_optimized: "Email".into(),
                }
            }
        }
    }
}

/// Run the generator on a worker thread and wait at most `timeout_ms`.
/// A timed-out worker is detached; its late answer is discarded.
pub fn call_with_timeout(
    generator: Arc<dyn NarrativeGenerator>,
    prompt: NarrativePrompt,
    timeout_ms: u64,
) -> Result<String, NarrativeError> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("narrative-call".into())
        .spawn(move || {
            let _ = tx.send(generator.generate(&prompt));
        })
        .map_err(|e| NarrativeError::Request(format!("cannot spawn worker: {e}")))?;

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(NarrativeError::Timeout(timeout_ms)),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(NarrativeError::Request("worker exited without a response".into()))
        }
    }
}

fn parse_response(raw: &str) -> Result<Explanation, NarrativeError> {
    let parsed: NarrativeResponse = serde_json::from_str(raw.trim())
        .map_err(|e| NarrativeError::Malformed(e.to_string()))?;

    let summary = parsed.summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NarrativeError::Malformed("missing summary".into()))?;

    Ok(Explanation {
        summary,
        key_factors:         non_blank(parsed.key_factors),
        recommended_actions: non_blank(parsed.recommended_actions),
        source:              NarrativeSource::Collaborator,
    })
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn template_explanation(req: &ExplanationRequest<'_>) -> Explanation {
    let mut recommended_actions = vec![TEMPLATE_ACTION.to_string()];
    if let Some(gap) = req.competitor {
        recommended_actions.push(format!(
            "Offer a price match or counter-offer against {}",
            competitor_label(gap)
        ));
    }
    Explanation {
        summary:     format!("Customer is at {} risk. Review recent transaction history.", req.tier),
        key_factors: vec![TEMPLATE_KEY_FACTOR.to_string()],
        recommended_actions,
        source:      NarrativeSource::Template,
    }
}

/// Fill empty lists and thread competitor context into the key factors.
fn finalize(mut e: Explanation, req: &ExplanationRequest<'_>) -> Explanation {
    if e.key_factors.is_empty() {
        e.key_factors.push(req.attribution.explanation.clone());
    }
    if e.recommended_actions.is_empty() {
        e.recommended_actions.push(DEFAULT_RECOMMENDATION.to_string());
    }
    if let Some(gap) = req.competitor {
        let name = competitor_label(gap);
        if !e.key_factors.iter().any(|k| k.contains(name)) {
            e.key_factors.push(competitor_factor(gap));
        }
    }
    e
}

fn competitor_label(gap: &CompetitorGap) -> &str {
    gap.competitor_name.as_deref().unwrap_or("a competitor")
}

pub fn competitor_factor(gap: &CompetitorGap) -> String {
    format!(
        "Competitor {} sells {} at ${:.2}, {:.1}% below our price",
        competitor_label(gap),
        gap.category,
        gap.competitor_price,
        gap.gap * 100.0,
    )
}

// ── Prompts ──────────────────────────────────────────────────────────────────

pub fn build_prompt(req: &ExplanationRequest<'_>, cfg: &NarrativeConfig) -> NarrativePrompt {
    let f = req.features;
    let mut user = String::from("Analyze this customer for churn risk.\n\n");

    if let Some(gap) = req.competitor {
        user.push_str(&format!(
            "**Competitor Alert:**\n\
             - Competitor '{}' is selling '{}' for ${:.2} (Gap: {:.1}%).\n\
             - This is a critical churn driver. You MUST name this competitor and the price difference as a key reason for churn.\n\
             - You MUST recommend a price match or counter-offer.\n\n",
            competitor_label(gap),
            f.primary_category,
            gap.competitor_price,
            gap.gap * 100.0,
        ));
    }

    user.push_str(&format!(
        "**Customer Profile:**\n\
         - Churn Risk Level: {}\n\
         - Churn Probability: {:.2}%\n\
         - Primary Category: {}\n\
         - Days Since Last Purchase: {}\n\
         - Yearly Purchases: {}\n\
         - Average Gap Between Purchases: {} days\n\
         - Discount Sensitivity: {}\n\
         - Online Shopping Ratio: {:.0}%\n\n",
        req.tier,
        req.probability * 100.0,
        f.primary_category,
        f.days_since_last_purchase,
        f.yearly_purchase_count,
        f.avg_gap_days,
        f.discount_sensitivity,
        f.online_ratio * 100.0,
    ));

    user.push_str("**Statistical Drivers:**\n");
    user.push_str(&format!("- {}\n", req.attribution.explanation));
    for c in &req.attribution.contributions {
        user.push_str(&format!("- {}: {:+.3}\n", c.feature, c.impact));
    }
    for reason in &req.attribution.reasons {
        user.push_str(&format!("- {reason}\n"));
    }

    user.push_str(
        "\n**Task:**\n\
         1. Write a 'summary' (2-3 sentences) explaining the situation to a store manager. Be empathetic but professional.\n\
         2. Identify 2-3 'key_factors' contributing to this risk (e.g., \"High price sensitivity\", \"Long absence\").\n\
         3. Suggest 3 specific 'recommended_actions' to retain them.\n\n\
         **Format:**\n\
         Return a single JSON object with keys: \"summary\", \"key_factors\", \"recommended_actions\".\n",
    );

    NarrativePrompt {
        system:      ANALYST_SYSTEM_PROMPT.to_string(),
        user,
        temperature: cfg.temperature,
    }
}

fn build_outreach_prompt(
    f: &CustomerFeatures,
    intervention_type: &str,
    details: &str,
    cfg: &NarrativeConfig,
) -> NarrativePrompt {
    let brand = &cfg.brand;
    let user = format!(
        "Draft a personalized retention message for a {brand} customer.\n\n\
         **Customer Context:**\n\
         - Customer ID: {}\n\
         - Primary Category: {}\n\
         - Days Since Last Purchase: {}\n\
         - Spending Level: {:.2} average\n\n\
         **Proposed Intervention:**\n\
         - Type: {intervention_type}\n\
         - Details: {details}\n\n\
         **Guidelines:**\n\
         - Tone: Warm, helpful, and exclusive.\n\
         - Mention their favorite category ({}).\n\
         - Make the offer ({details}) the star of the message.\n\
         - Keep it concise for mobile reading.\n\n\
         **Format:**\n\
         Return JSON with keys: 'subject_line', 'message_body', 'channel_optimized'.\n",
        f.customer_id,
        f.primary_category,
        f.days_since_last_purchase,
        f.avg_order_value,
        f.primary_category,
    );
    NarrativePrompt {
        system: format!(
            "You are a professional Customer Relationship Copywriter for {brand}. You specialize in \
             high-conversion, empathetic retention messaging. Output ONLY valid JSON."
        ),
        user,
        temperature: cfg.outreach_temperature,
    }
}
