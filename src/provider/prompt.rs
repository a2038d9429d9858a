use crate::estimate::dto::Mode;

pub const SYSTEM_PROMPT: &str = "You are a nutrition expert analyzing food images. \
Provide only the requested JSON object with no additional text.";

const BASIC_PROMPT: &str = r#"Return ONLY a JSON object with these fields:
{
  "calories": [number],
  "protein": [string with g suffix],
  "carbs": [string with g suffix],
  "fat": [string with g suffix]
}

Analyze this food image and estimate nutritional values based on visible portion size.
If no edible food is recognizable in the image, set every field above to null and add a "message" field explaining what you see instead."#;

const DETAILED_PROMPT: &str = r#"Return ONLY a JSON object with these fields:
{
  "calories": [number],
  "protein": [string with g suffix],
  "carbs": [string with g suffix],
  "fat": [string with g suffix],
  "ingredients": [array of 3 to 5 strings naming the main visible ingredients]
}

Analyze this food image and estimate nutritional values based on visible portion size.
If no edible food is recognizable in the image, set every field above to null and add a "message" field explaining what you see instead."#;

pub fn user_prompt(mode: Mode) -> &'static str {
    match mode {
        Mode::Basic => BASIC_PROMPT,
        Mode::Detailed => DETAILED_PROMPT,
    }
}
