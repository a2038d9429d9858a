use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{NutritionEstimator, ProviderError};
use crate::estimate::dto::{Mode, NO_FOOD_MESSAGE};
use crate::estimate::intake::UploadedImage;

/// Canned replies keyed by hints in the uploaded filename, for running
/// without a provider key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockEstimator;

struct CannedMeal {
    hint: &'static str,
    calories: u32,
    protein: &'static str,
    carbs: &'static str,
    fat: &'static str,
    ingredients: &'static [&'static str],
}

const MEALS: &[CannedMeal] = &[
    CannedMeal {
        hint: "pizza",
        calories: 300,
        protein: "12g",
        carbs: "35g",
        fat: "10g",
        ingredients: &["pizza dough", "tomato sauce", "cheese", "pepperoni"],
    },
    CannedMeal {
        hint: "salad",
        calories: 150,
        protein: "5g",
        carbs: "10g",
        fat: "8g",
        ingredients: &["lettuce", "tomato", "cucumber", "olive oil"],
    },
    CannedMeal {
        hint: "burger",
        calories: 550,
        protein: "30g",
        carbs: "40g",
        fat: "25g",
        ingredients: &["beef patty", "burger bun", "lettuce", "tomato", "cheese"],
    },
];

const DEFAULT_MEAL: CannedMeal = CannedMeal {
    hint: "",
    calories: 540,
    protein: "30g",
    carbs: "45g",
    fat: "22g",
    ingredients: &["grilled chicken", "rice", "broccoli"],
};

impl MockEstimator {
    /// Reply shaped like a provider answer for `filename`.
    pub fn reply_for(filename: Option<&str>, mode: Mode) -> String {
        let name = filename.unwrap_or_default().to_ascii_lowercase();
        let meal = MEALS
            .iter()
            .find(|m| name.contains(m.hint))
            .unwrap_or(&DEFAULT_MEAL);

        let mut reply = json!({
            "calories": meal.calories,
            "protein": meal.protein,
            "carbs": meal.carbs,
            "fat": meal.fat,
        });
        if mode == Mode::Detailed {
            reply["ingredients"] = json!(meal.ingredients);
        }
        reply.to_string()
    }

    /// Reply a provider gives when no food is in the picture.
    pub fn no_food_reply() -> String {
        json!({
            "calories": null,
            "protein": null,
            "carbs": null,
            "fat": null,
            "ingredients": null,
            "message": NO_FOOD_MESSAGE,
        })
        .to_string()
    }
}

#[async_trait]
impl NutritionEstimator for MockEstimator {
    async fn estimate(&self, image: &UploadedImage) -> Result<String, ProviderError> {
        info!(mode = %image.mode, "serving mock estimate");
        Ok(Self::reply_for(image.original_filename.as_deref(), image.mode))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
