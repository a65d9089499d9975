//! Serializable image of a finished routine.
//!
//! Method bodies are host closures and cannot be persisted, so the image keeps
//! only what is needed to inspect and re-verify a unit: rendered
//! instructions, their stack effects, labels and protected regions.

use serde::{Deserialize, Serialize};

use crate::listing::instruction_text;
use crate::verify::{verify, Effect, RegionSpan, RoutineShape, StackReport};
use crate::{EmitError, ReturnKind, RoutineBody};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInstr {
    pub text: String,
    pub effect: Effect,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegion {
    pub span: RegionSpan,
    /// Catch type names, one per handler in `span.handlers`.
    pub catches: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitImage {
    pub name: String,
    pub params: Vec<String>,
    pub returns: ReturnKind,
    pub instructions: Vec<ImageInstr>,
    pub labels: Vec<Option<u32>>,
    pub regions: Vec<ImageRegion>,
}

impl UnitImage {
    pub fn of<M>(body: &RoutineBody<M>) -> Result<Self, EmitError> {
        let instructions = body
            .ops
            .iter()
            .map(|op| {
                Ok(ImageInstr {
                    text: instruction_text(body, op),
                    effect: body.effect(op)?,
                })
            })
            .collect::<Result<Vec<_>, EmitError>>()?;
        let regions = body
            .regions
            .iter()
            .zip(body.spans())
            .map(|(region, span)| ImageRegion {
                span,
                catches: region
                    .handlers
                    .iter()
                    .map(|h| h.catch.name().to_owned())
                    .collect(),
            })
            .collect();
        Ok(UnitImage {
            name: body.name.clone(),
            params: body
                .signature
                .params
                .iter()
                .map(|p| p.describe().to_owned())
                .collect(),
            returns: body.signature.returns,
            instructions,
            labels: body.labels.clone(),
            regions,
        })
    }

    /// Re-run stack verification on the persisted shape.
    pub fn verify(&self) -> Result<StackReport, EmitError> {
        let effects: Vec<Effect> = self.instructions.iter().map(|i| i.effect).collect();
        let spans: Vec<RegionSpan> = self.regions.iter().map(|r| r.span.clone()).collect();
        verify(&RoutineShape {
            effects: &effects,
            labels: &self.labels,
            regions: &spans,
            returns: self.returns,
        })
    }
}
