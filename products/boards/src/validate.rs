use platform_api::ValidationErrors;

pub(crate) const BLANK: &str = "This field may not be blank.";
pub(crate) const DOES_NOT_EXIST: &str = "Invalid pk - object does not exist.";

/// Trimmed, non-blank, at most `max` characters.
pub(crate) fn title(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    max: usize,
) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if trimmed.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
        return None;
    }
    Some(trimmed.to_string())
}

pub(crate) fn not_blank(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
    }
}
