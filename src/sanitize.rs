/// Clean user-authored HTML with the allow-list used for post and comment bodies.
/// Script and style elements are dropped together with their content.
pub fn sanitize(dirty: &str) -> String {
    ammonia::clean(dirty)
}
