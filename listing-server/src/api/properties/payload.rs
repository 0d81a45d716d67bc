//! Property mutation payload
//!
//! Create and update accept either a JSON body or a multipart form. In a
//! form, the structured data comes from the `propertyData` JSON field when
//! present, otherwise from the plain text fields. Image files arrive under
//! `images`.

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use serde_json::{Map, Value};
use shared::models::PropertyInput;

use crate::core::ServerState;
use crate::images::intake::read_multipart;
use crate::images::{ImageInstructions, UploadedImage};
use crate::utils::validation::{
    MAX_ADDRESS_LEN, MAX_DESCRIPTION_LEN, MAX_SHORT_TEXT_LEN, MAX_TITLE_LEN,
    validate_non_negative, validate_optional_text, validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// Multipart field holding the JSON-encoded property
pub const PROPERTY_DATA_FIELD: &str = "propertyData";

/// Decoded and validated create/update request
#[derive(Debug)]
pub struct PropertyPayload {
    pub input: PropertyInput,
    pub instructions: ImageInstructions,
    pub uploads: Vec<UploadedImage>,
}

impl FromRequest<ServerState> for PropertyPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &ServerState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        let (data, uploads) = if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            let form = read_multipart(multipart, &state.property_uploads).await?;
            (structured_from_form(form.fields)?, form.images)
        } else {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            match value {
                Value::Object(map) => (map, Vec::new()),
                _ => return Err(AppError::validation("Request body must be a JSON object")),
            }
        };

        Self::from_parts(data, uploads)
    }
}

impl PropertyPayload {
    /// Build from the structured fields and the decoded uploads
    pub fn from_parts(data: Map<String, Value>, uploads: Vec<UploadedImage>) -> AppResult<Self> {
        let data = Value::Object(data);
        let instructions = ImageInstructions::from_payload(&data);
        let input: PropertyInput = serde_json::from_value(data)
            .map_err(|e| AppError::validation(format!("Invalid property data: {e}")))?;
        validate_input(&input)?;

        Ok(Self {
            input,
            instructions,
            uploads,
        })
    }
}

/// `propertyData` wins; instruction fields sent as separate form fields are
/// still honored when it does not carry them.
fn structured_from_form(mut fields: Map<String, Value>) -> AppResult<Map<String, Value>> {
    let Some(raw) = fields.remove(PROPERTY_DATA_FIELD) else {
        return Ok(fields);
    };

    let text = match raw {
        Value::String(s) => s,
        _ => return Err(AppError::validation("propertyData must be sent once")),
    };
    let mut data = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(AppError::validation("propertyData must be a JSON object")),
        Err(e) => return Err(AppError::validation(format!("Malformed propertyData: {e}"))),
    };

    for key in [
        ImageInstructions::KEEP_FIELD,
        ImageInstructions::REMOVE_FIELD,
        ImageInstructions::REPLACE_FIELD,
    ] {
        if !data.contains_key(key)
            && let Some(value) = fields.remove(key)
        {
            data.insert(key.to_string(), value);
        }
    }
    Ok(data)
}

fn validate_input(input: &PropertyInput) -> AppResult<()> {
    validate_required_text(&input.title, "title", MAX_TITLE_LEN)?;
    validate_required_text(&input.property_type, "property_type", MAX_SHORT_TEXT_LEN)?;
    validate_required_text(&input.listing_type, "listing_type", MAX_SHORT_TEXT_LEN)?;
    validate_optional_text(&input.description, "description", MAX_DESCRIPTION_LEN)?;
    validate_optional_text(&input.address, "address", MAX_ADDRESS_LEN)?;
    validate_optional_text(&input.city, "city", MAX_ADDRESS_LEN)?;
    validate_optional_text(&input.state, "state", MAX_SHORT_TEXT_LEN)?;
    validate_optional_text(&input.zip_code, "zip_code", MAX_SHORT_TEXT_LEN)?;
    validate_optional_text(&input.country, "country", MAX_SHORT_TEXT_LEN)?;
    validate_non_negative(input.price, "price")?;
    if let Some(bathrooms) = input.bathrooms {
        validate_non_negative(bathrooms, "bathrooms")?;
    }
    for (value, field) in [
        (input.bedrooms, "bedrooms"),
        (input.area_sqft, "area_sqft"),
        (input.year_built, "year_built"),
    ] {
        if value.is_some_and(|v| v < 0) {
            return Err(AppError::validation(format!("{field} must not be negative")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_form_with_property_data() {
        let fields = object(json!({
            "propertyData": r#"{"title":"Barn","property_type":"house","listing_type":"sale","price":10}"#,
            "imagesToRemove": "4,5",
            "replaceImages": "1"
        }));
        let payload = PropertyPayload::from_parts(structured_from_form(fields).unwrap(), Vec::new()).unwrap();
        assert_eq!(payload.input.title, "Barn");
        assert_eq!(payload.instructions.remove, vec!["4", "5"]);
        assert!(payload.instructions.replace_all);
    }

    #[test]
    fn test_form_without_property_data_uses_text_fields() {
        let fields = object(json!({
            "title": "Loft",
            "property_type": "apartment",
            "listing_type": "rent",
            "price": "1800",
            "bedrooms": "2",
            "images": "[7]"
        }));
        let payload = PropertyPayload::from_parts(structured_from_form(fields).unwrap(), Vec::new()).unwrap();
        assert_eq!(payload.input.price, 1800.0);
        assert_eq!(payload.input.bedrooms, Some(2));
        assert_eq!(payload.instructions.keep, vec!["7"]);
    }

    #[test]
    fn test_malformed_property_data_rejected() {
        let fields = object(json!({ "propertyData": "{not json" }));
        let err = structured_from_form(fields).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let missing_title = object(json!({
            "title": " ",
            "property_type": "house",
            "listing_type": "sale",
            "price": 1
        }));
        assert!(PropertyPayload::from_parts(missing_title, Vec::new()).is_err());

        let negative_price = object(json!({
            "title": "x",
            "property_type": "house",
            "listing_type": "sale",
            "price": -5
        }));
        assert!(PropertyPayload::from_parts(negative_price, Vec::new()).is_err());

        let bad_price = object(json!({
            "title": "x",
            "property_type": "house",
            "listing_type": "sale",
            "price": "cheap"
        }));
        assert!(PropertyPayload::from_parts(bad_price, Vec::new()).is_err());
    }
}
