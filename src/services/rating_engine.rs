//! Skill-rating model applied to a round result.
//!
//! The default engine runs the Weng-Lin Bayesian approximation from
//! `skillratings`: the winner takes first place and every loser shares second
//! place, so losers are not ranked among themselves.

use skillratings::{
    MultiTeamOutcome,
    weng_lin::{WengLinConfig, WengLinRating, weng_lin_multi_team},
};

use crate::{config::RatingParams, state::game::Rating};

/// Pure rating update for one round.
pub trait RatingEngine: Send + Sync {
    /// `players[0]` beat every other entry. Returns the updated ratings in input order.
    fn adjust(&self, players: &[Rating]) -> Vec<Rating>;
}

/// Weng-Lin Bradley-Terry update.
#[derive(Debug, Clone, Copy)]
pub struct BradleyTerryEngine {
    params: RatingParams,
}

impl BradleyTerryEngine {
    /// Engine using `params` for beta, tau and kappa.
    pub fn new(params: RatingParams) -> Self {
        Self { params }
    }

    fn config(&self) -> WengLinConfig {
        WengLinConfig {
            beta: self.params.beta,
            uncertainty_tolerance: self.params.kappa,
        }
    }
}

impl Default for BradleyTerryEngine {
    fn default() -> Self {
        Self::new(RatingParams::default())
    }
}

impl RatingEngine for BradleyTerryEngine {
    fn adjust(&self, players: &[Rating]) -> Vec<Rating> {
        if players.len() < 2 {
            return players.to_vec();
        }

        // Dynamics term widens every prior before the match.
        let tau_sq = self.params.tau * self.params.tau;
        let teams: Vec<[WengLinRating; 1]> = players
            .iter()
            .map(|player| {
                [WengLinRating {
                    rating: player.mu,
                    uncertainty: (player.sigma * player.sigma + tau_sq).sqrt(),
                }]
            })
            .collect();
        let ranked: Vec<(&[WengLinRating], MultiTeamOutcome)> = teams
            .iter()
            .enumerate()
            .map(|(index, team)| {
                let rank = if index == 0 { 1 } else { 2 };
                (&team[..], MultiTeamOutcome::new(rank))
            })
            .collect();

        weng_lin_multi_team(&ranked, &self.config())
            .into_iter()
            .zip(players)
            .map(|(team, before)| {
                team.first()
                    .map(|rating| Rating::new(rating.rating, rating.uncertainty))
                    .unwrap_or(*before)
            })
            .collect()
    }
}
