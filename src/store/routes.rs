use crate::models::GameId;

/// Game routes relative to the API base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Game(&'a GameId),
    Move(&'a GameId),
    Resign(&'a GameId),
    Rematch(&'a GameId),
    OfferDraw(&'a GameId),
    AcceptDraw(&'a GameId),
    DenyDraw(&'a GameId),
    ClaimDraw(&'a GameId),
}

impl Route<'_> {
    pub fn path(&self) -> String {
        match self {
            Route::Game(id) => format!("/games/{id}"),
            Route::Move(id) => format!("/games/{id}/move"),
            Route::Resign(id) => format!("/games/{id}/resign"),
            Route::Rematch(id) => format!("/games/{id}/rematch"),
            Route::OfferDraw(id) => format!("/games/{id}/draw/offer"),
            Route::AcceptDraw(id) => format!("/games/{id}/draw/accept"),
            Route::DenyDraw(id) => format!("/games/{id}/draw/deny"),
            Route::ClaimDraw(id) => format!("/games/{id}/draw/claim"),
        }
    }

    pub fn url(&self, api_base: &str) -> String {
        format!("{}{}", api_base.trim_end_matches('/'), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls() {
        let id = GameId::new("12");
        assert_eq!(Route::Game(&id).url("http://h/api/"), "http://h/api/games/12");
        assert_eq!(Route::Move(&id).path(), "/games/12/move");
        assert_eq!(Route::DenyDraw(&id).path(), "/games/12/draw/deny");
    }
}
