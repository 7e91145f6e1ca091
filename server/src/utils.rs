use shared::is_valid_name;

// Strip the line terminator and surrounding whitespace from a handshake name.
// Names that could not be written into a score line are refused.
pub fn clean_player_name(line: &str) -> Option<&str> {
    let name = line.trim();
    if is_valid_name(name) {
        Some(name)
    } else {
        None
    }
}
