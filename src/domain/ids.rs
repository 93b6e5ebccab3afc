/// Deterministic document id built from several identifiers.
///
/// Every part is written as `{len}.{part}`, so ids that happen to contain the
/// separator cannot collide: `("W_A", "X")` and `("W", "A_X")` give
/// `p_3.W_A_1.X` and `p_1.W_3.A_X`.
pub fn compound_id(prefix: &str, parts: &[&str]) -> String {
    let mut id = String::from(prefix);
    for part in parts {
        id.push('_');
        id.push_str(&part.chars().count().to_string());
        id.push('.');
        id.push_str(part);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscores_inside_parts_do_not_collide() {
        assert_ne!(compound_id("delivery", &["W_A", "X"]), compound_id("delivery", &["W", "A_X"]));
        assert_ne!(compound_id("n", &["a_b", ""]), compound_id("n", &["a", "b_"]));
        assert_eq!(compound_id("delivery", &["W1", "O1"]), "delivery_2.W1_2.O1");
    }

    #[test]
    fn test_length_counts_characters() {
        assert_eq!(compound_id("x", &["é"]), "x_1.é");
    }
}
