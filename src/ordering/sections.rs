//! Store section list edits.
//!
//! Each edit returns the complete new sequence; callers persist it as one
//! whole-array replace, so concurrent edits to the same store are last-write-wins.

use crate::errors::AppError;

/// Append `name` (trimmed) to the end of the layout. Duplicates are allowed.
pub fn add_section(sections: &[String], name: &str) -> Result<Vec<String>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Section name is required".to_string(),
        ));
    }
    let mut next = sections.to_vec();
    next.push(name.to_string());
    Ok(next)
}

/// Swap the section at `index` with the one above it; no-op at the top.
pub fn move_up(sections: &[String], index: usize) -> Result<Vec<String>, AppError> {
    check_index(sections, index)?;
    let mut next = sections.to_vec();
    if index > 0 {
        next.swap(index - 1, index);
    }
    Ok(next)
}

/// Swap the section at `index` with the one below it; no-op at the bottom.
pub fn move_down(sections: &[String], index: usize) -> Result<Vec<String>, AppError> {
    check_index(sections, index)?;
    let mut next = sections.to_vec();
    if index + 1 < next.len() {
        next.swap(index, index + 1);
    }
    Ok(next)
}

/// Remove the section at `index`.
pub fn remove_section(sections: &[String], index: usize) -> Result<Vec<String>, AppError> {
    check_index(sections, index)?;
    let mut next = sections.to_vec();
    next.remove(index);
    Ok(next)
}

/// Validate a full replacement sequence: every name trimmed and non-blank.
pub fn normalize_sections(sections: &[String]) -> Result<Vec<String>, AppError> {
    sections
        .iter()
        .map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(AppError::Validation(
                    "Section names must not be blank".to_string(),
                ))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

fn check_index(sections: &[String], index: usize) -> Result<(), AppError> {
    if index >= sections.len() {
        return Err(AppError::Index {
            index,
            len: sections.len(),
        });
    }
    Ok(())
}
