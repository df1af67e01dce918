//! Requirement pipeline: decompose the request, elaborate each requirement,
//! and write one narrative test case per elaborated requirement.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::reply::parse_reply;
use crate::core::types::{ElaboratedRequirement, TestCase, TestPlan};
use crate::io::llm::CompletionClient;
use crate::io::prompt::{render_decompose, render_elaborate, render_test_case};

pub struct TestGenerationAgent<'a, C: CompletionClient> {
    client: &'a C,
    design_image: Option<PathBuf>,
}

impl<'a, C: CompletionClient> TestGenerationAgent<'a, C> {
    pub fn new(client: &'a C, design_image: Option<PathBuf>) -> Self {
        Self {
            client,
            design_image,
        }
    }

    /// Run all three stages. Output lists are 1:1 and in input order.
    #[instrument(skip_all, fields(has_image = self.design_image.is_some()))]
    pub fn generate_tests(&self, user_input: &str) -> Result<TestPlan> {
        info!("starting test generation");
        let high_level_requirements = self.decompose(user_input)?;
        info!(count = high_level_requirements.len(), "decomposed requirements");

        let detailed_requirements = self.elaborate(user_input, &high_level_requirements)?;
        info!(count = detailed_requirements.len(), "elaborated requirements");

        let test_cases = self.generate_test_cases(&detailed_requirements)?;
        info!(count = test_cases.len(), "generated test cases");

        Ok(TestPlan {
            high_level_requirements,
            detailed_requirements,
            test_cases,
        })
    }

    /// Ask for a JSON array of requirement strings. An unparseable reply is an error.
    pub fn decompose(&self, user_input: &str) -> Result<Vec<String>> {
        let prompt = render_decompose(user_input, self.design_image.is_some())?;
        let reply = self.ask(&prompt).context("request requirement decomposition")?;
        parse_reply::<Vec<String>>(&reply).with_context(|| {
            format!("parse requirement list from reply: {}", excerpt(&reply))
        })
    }

    pub fn elaborate(
        &self,
        user_input: &str,
        requirements: &[String],
    ) -> Result<Vec<ElaboratedRequirement>> {
        let has_image = self.design_image.is_some();
        let mut detailed = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let prompt = render_elaborate(user_input, requirement, has_image)?;
            let reply = self
                .ask(&prompt)
                .with_context(|| format!("request elaboration of {requirement:?}"))?;
            let elaborated = match parse_reply::<ElaboratedRequirement>(&reply) {
                Ok(mut parsed) => {
                    if parsed.requirement.trim().is_empty() {
                        parsed.requirement = requirement.clone();
                    }
                    parsed
                }
                Err(err) => {
                    warn!(requirement = %requirement, err = %err, "unparseable elaboration, using fallback");
                    ElaboratedRequirement::fallback(requirement)
                }
            };
            detailed.push(elaborated);
        }
        Ok(detailed)
    }

    pub fn generate_test_cases(&self, detailed: &[ElaboratedRequirement]) -> Result<Vec<TestCase>> {
        let mut cases = Vec::with_capacity(detailed.len());
        for (index, requirement) in detailed.iter().enumerate() {
            let position = index + 1;
            let prompt = render_test_case(requirement, position)?;
            let reply = self
                .client
                .prompt(&prompt)
                .with_context(|| format!("request test case {position}"))?;
            let case = match parse_reply::<TestCase>(&reply) {
                Ok(mut parsed) => {
                    if parsed.test_id.trim().is_empty() {
                        parsed.test_id = format!("test_{position}");
                    }
                    if parsed.requirement.trim().is_empty() {
                        parsed.requirement = requirement.requirement.clone();
                    }
                    parsed
                }
                Err(err) => {
                    warn!(position, err = %err, "unparseable test case, using fallback");
                    TestCase::fallback(position, &requirement.requirement)
                }
            };
            debug!(test_id = %case.test_id, steps = case.steps.len(), "test case ready");
            cases.push(case);
        }
        Ok(cases)
    }

    /// Text-only prompt, or prompt plus the design image when one was supplied.
    fn ask(&self, prompt: &str) -> Result<String> {
        let reply = match &self.design_image {
            Some(image) => {
                self.client
                    .complete_with_images(prompt, std::slice::from_ref(image), None)?
            }
            None => self.client.prompt(prompt)?,
        };
        Ok(reply)
    }
}

fn excerpt(reply: &str) -> String {
    const MAX: usize = 200;
    let mut out: String = reply.chars().take(MAX).collect();
    if reply.chars().count() > MAX {
        out.push_str("...");
    }
    out
}
