// src/services/prompts.rs
use crate::models::DiagnosisMode;
use serde_json::{Value, json};

pub const SUBJECT_LABEL: &str = "USER_PHOTO (main user / bride):";
pub const PARTNER_LABEL: &str = "PARTNER_PHOTO (groom / partner):";
pub const CATALOG_LABEL: &str = "AVAILABLE_DRESS_CATALOG:";

/// Text sent with a chat turn that carries only a photo.
pub const IMAGE_ONLY_PROMPT: &str = "Please tell me about this photo.";

pub const DIAGNOSIS_PERSONA: &str = r#"
You are the personal concierge of "New Vintage Wedding", a dress shop in Kobe, Hyogo
that is loved by its customers and rated highly in reviews. Analyse the photos of the
user (bride) and, when present, the partner (groom) and give a styling diagnosis.
Write every text field in Japanese with warm, refined hospitality.
"#;

pub const CHAT_PERSONA: &str = r#"
You are the personal concierge of "New Vintage Wedding", a highly rated dress shop in Kobe.
Shop background: vintage and modern styles that suit Kobe's refined streets.
Personality: gentle, friendly, close to the customer's feelings, soft-spoken.
Rules:
1. Keep answers concise.
2. Always end your reply with a question.
3. Only advise on choosing dresses and preparing for the wedding, including how the
   couple can support each other and personality tendencies read from face shape.
4. Let the customer feel you look forward to welcoming them at the Kobe shop.
Reply in Japanese.
"#;

pub fn diagnosis_task(mode: DiagnosisMode, with_partner: bool) -> String {
    let partner_rule = if with_partner {
        "A partner photo is included: also identify the partner's face shape, skin tone, \
         personal color and atmosphere, and describe how the two complement each other."
    } else {
        "No partner photo is included: omit partnerDiagnosis and partnerCompatibility."
    };

    format!(
        r#"Diagnosis focus: {focus}.
Rules:
1. Identify the user's personal color and face shape.
2. {partner_rule}
3. Read personality tendencies from face shape (physiognomy), then advise on the mindset
   that keeps wedding preparation smooth and how to show consideration for each other.
   Mention how the couple's colors harmonise.
4. Choose the best dress from AVAILABLE_DRESS_CATALOG and return its DRESS_ID as bestMatchId.
   Return an empty bestMatchId when the catalog is empty.

Output fields (JSON):
- recommendedDress: catch copy for the recommended dress
- dressLine: silhouette of the dress
- bestMatchId: DRESS_ID of the best matching catalog dress
- reason: why this dress was chosen
- analysisReasons: facial, skin and atmosphere reasoning
- faceReading: personality and charm read from the face shape(s)
- faceShape: the user's face shape
- personalColor: the user's personal color
- atmosphereLabel: one-phrase label for the user's atmosphere
- partnerCompatibility: compatibility and color harmony of the couple (partner only)
- partnerDiagnosis: faceShape, skinTone, personalColor, atmosphereLabel (partner only)
- weddingAdvice: mindset and consideration for smooth preparation
- stylingDetails: accessories, hairstyle, bouquet
- conciergeMessage: closing message of encouragement"#,
        focus = mode.label(),
        partner_rule = partner_rule,
    )
}

/// Declared reply schema. Partner fields stay optional because the schema cannot
/// express "required only with a partner photo".
pub fn diagnosis_response_schema() -> Value {
    let string = json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "recommendedDress": string,
            "dressLine": string,
            "bestMatchId": string,
            "reason": string,
            "analysisReasons": {
                "type": "OBJECT",
                "properties": { "facial": string, "skin": string, "atmosphere": string },
                "required": ["facial", "skin", "atmosphere"]
            },
            "faceReading": string,
            "faceShape": string,
            "personalColor": string,
            "atmosphereLabel": string,
            "partnerCompatibility": string,
            "weddingAdvice": string,
            "partnerDiagnosis": {
                "type": "OBJECT",
                "properties": {
                    "faceShape": string,
                    "skinTone": string,
                    "personalColor": string,
                    "atmosphereLabel": string
                },
                "required": ["faceShape", "skinTone", "personalColor", "atmosphereLabel"]
            },
            "stylingDetails": {
                "type": "OBJECT",
                "properties": { "accessories": string, "hairstyle": string, "bouquet": string },
                "required": ["accessories", "hairstyle", "bouquet"]
            },
            "conciergeMessage": string,
            "preparationTasks": string,
            "weddingScenario": string
        },
        "required": [
            "recommendedDress", "dressLine", "bestMatchId", "reason", "analysisReasons",
            "faceReading", "faceShape", "personalColor", "atmosphereLabel", "weddingAdvice",
            "stylingDetails", "conciergeMessage"
        ]
    })
}
