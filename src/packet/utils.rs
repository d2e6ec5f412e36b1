/// Largest frame a length field may describe.
pub(crate) const MAX_FRAME_LEN: usize = 1275;

// https://datatracker.ietf.org/doc/html/rfc6716#section-3.2.1
/// Reads a one or two byte frame length, returning it with the number of
/// bytes the field used. `None` if `bytes` ends inside the field.
pub(crate) fn parse_frame_length(bytes: &[u8]) -> Option<(usize, usize)> {
    let first = *bytes.first()? as usize;

    if first < 252 {
        return Some((first, 1));
    }

    let second = *bytes.get(1)? as usize;

    Some((first + second * 4, 2))
}
