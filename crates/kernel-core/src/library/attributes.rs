//! Built-in attribute modules.
//!
//! Each generator consumes only its sub-seed and the birth year, so a
//! module's output is independent of registration order.

use contracts::error::HookError;
use contracts::{AttrValue, AGE_YEARS};

use crate::module_runtime::{AttributeModule, GeneratedAttributes, SimContext};
use crate::rng::Xorshift32;

pub const HEIGHT_CM: &str = "HEIGHT_CM";
pub const WEIGHT_KG: &str = "WEIGHT_KG";
pub const BMI: &str = "BMI";
pub const SMOKER: &str = "SMOKER";
pub const PACK_YEARS: &str = "PACK_YEARS";
pub const SBP: &str = "SBP";
pub const A1C: &str = "A1C";

pub fn demographics() -> AttributeModule {
    AttributeModule {
        id: "demographics".to_string(),
        category: "demographics".to_string(),
        summary: "Start age and sex at birth".to_string(),
        generate: Box::new(|sub_seed, _birth_year| {
            let mut rng = Xorshift32::new(sub_seed);
            let start_age = 20.0 + rng.uniform() * 50.0;
            let sex = if rng.uniform() < 0.5 { "F" } else { "M" };

            let mut generated = GeneratedAttributes::default();
            generated
                .attributes
                .insert(AGE_YEARS.to_string(), AttrValue::Number(start_age));
            generated.sex_at_birth = Some(sex.to_string());
            Ok(generated)
        }),
        update: None,
        test: Some(Box::new(|seed| {
            let generated = (demographics().generate)(seed, 1970)?;
            if generated.sex_at_birth.is_none() {
                return Err(HookError::new("demographics", "no sex at birth generated"));
            }
            match generated.attributes.get(AGE_YEARS).and_then(AttrValue::as_number) {
                Some(age) if (20.0..70.0).contains(&age) => Ok(()),
                other => Err(HookError::new(
                    "demographics",
                    format!("start age out of range: {other:?}"),
                )),
            }
        })),
    }
}

pub fn anthropometrics() -> AttributeModule {
    AttributeModule {
        id: "anthropometrics".to_string(),
        category: "anthropometrics".to_string(),
        summary: "Height, weight, and BMI with monthly weight drift".to_string(),
        generate: Box::new(|sub_seed, _birth_year| {
            let mut rng = Xorshift32::new(sub_seed);
            let height_cm = rng.normal(168.0, 9.5);
            let bmi = rng.normal(27.5, 5.0);
            let height_m = height_cm / 100.0;
            let weight_kg = bmi * height_m * height_m;

            let mut generated = GeneratedAttributes::default();
            generated
                .attributes
                .insert(HEIGHT_CM.to_string(), AttrValue::Number(height_cm));
            generated
                .attributes
                .insert(WEIGHT_KG.to_string(), AttrValue::Number(weight_kg));
            generated
                .attributes
                .insert(BMI.to_string(), AttrValue::Number(bmi));
            Ok(generated)
        }),
        update: Some(Box::new(|ctx: &mut SimContext<'_>, dt_years| {
            let Some(height_cm) = ctx.patient().num(HEIGHT_CM) else {
                return Ok(());
            };
            let weight = ctx.patient().num(WEIGHT_KG).unwrap_or(75.0);
            // slow upward drift with noise, re-clamped by the catalog
            let drift = 0.25 * dt_years * 12.0;
            let next = weight + ctx.rng_normal(drift * 0.1, 0.2);
            ctx.set_attr(WEIGHT_KG, next);
            let height_m = height_cm / 100.0;
            let bmi = ctx.patient().num(WEIGHT_KG).unwrap_or(next) / (height_m * height_m);
            ctx.set_attr(BMI, bmi);
            Ok(())
        })),
        test: Some(Box::new(|seed| {
            let generated = (anthropometrics().generate)(seed, 1970)?;
            let num = |key: &str| {
                generated
                    .attributes
                    .get(key)
                    .and_then(AttrValue::as_number)
                    .ok_or_else(|| HookError::new("anthropometrics", format!("missing {key}")))
            };
            let height_m = num(HEIGHT_CM)? / 100.0;
            let bmi = num(BMI)?;
            if (bmi - num(WEIGHT_KG)? / (height_m * height_m)).abs() > 1e-6 {
                return Err(HookError::new(
                    "anthropometrics",
                    "BMI inconsistent with height and weight",
                ));
            }
            Ok(())
        })),
    }
}

pub fn smoking() -> AttributeModule {
    AttributeModule {
        id: "smoking".to_string(),
        category: "behavior".to_string(),
        summary: "Smoking status and pack-year accumulation".to_string(),
        generate: Box::new(|sub_seed, _birth_year| {
            let mut rng = Xorshift32::new(sub_seed);
            let smoker = rng.uniform() < 0.18;
            let pack_years = if smoker { rng.uniform() * 30.0 } else { 0.0 };

            let mut generated = GeneratedAttributes::default();
            generated
                .attributes
                .insert(SMOKER.to_string(), AttrValue::Bool(smoker));
            generated
                .attributes
                .insert(PACK_YEARS.to_string(), AttrValue::Number(pack_years));
            Ok(generated)
        }),
        update: Some(Box::new(|ctx: &mut SimContext<'_>, dt_years| {
            if !ctx.patient().flag(SMOKER) {
                return Ok(());
            }
            let pack_years = ctx.patient().num(PACK_YEARS).unwrap_or(0.0);
            ctx.set_attr(PACK_YEARS, pack_years + dt_years);
            if ctx.rng_uniform() < 0.002 {
                ctx.set_attr(SMOKER, false);
            }
            Ok(())
        })),
        test: None,
    }
}

pub fn vitals() -> AttributeModule {
    AttributeModule {
        id: "vitals".to_string(),
        category: "vitals".to_string(),
        summary: "Systolic blood pressure and hemoglobin A1c baselines".to_string(),
        generate: Box::new(|sub_seed, _birth_year| {
            let mut rng = Xorshift32::new(sub_seed);
            let sbp = rng.normal(122.0, 14.0);
            let a1c = rng.normal(5.5, 0.6);

            let mut generated = GeneratedAttributes::default();
            generated
                .attributes
                .insert(SBP.to_string(), AttrValue::Number(sbp));
            generated
                .attributes
                .insert(A1C.to_string(), AttrValue::Number(a1c));
            generated.signals.insert("sbp_trend".to_string(), 0.0);
            Ok(generated)
        }),
        update: Some(Box::new(|ctx: &mut SimContext<'_>, dt_years| {
            let sbp = ctx.patient().num(SBP).unwrap_or(120.0);
            let trend = ctx.get("sbp_trend").unwrap_or(0.0);
            let next_trend = trend + ctx.rng_normal(0.0, 0.05);
            ctx.set("sbp_trend", next_trend.clamp(-2.0, 2.0));
            ctx.set_attr(SBP, sbp + (0.35 + next_trend) * dt_years);
            Ok(())
        })),
        test: None,
    }
}
