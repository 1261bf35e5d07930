//! Stochastic delivery model.
//!
//! Delay and delivery success are independent random draws per created message.
//! Channel load never feeds back into either draw.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

use crate::{
    config::{ConfigError, SimConfig},
    units::{Time, Unit},
};

#[derive(Debug, Clone)]
pub struct DeliveryModel<R = ChaCha12Rng> {
    /// `None` when the maximum delay is zero.
    delay: Option<Uniform<f64>>,
    delivery: Bernoulli,
    rng: R,
}

impl DeliveryModel<ChaCha12Rng> {
    pub fn from_seed(config: &SimConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, ChaCha12Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> DeliveryModel<R> {
    /// Build a delivery model drawing from the provided random source.
    pub fn with_rng(config: &SimConfig, rng: R) -> Result<Self, ConfigError> {
        let max_delay = config.message_delay_max.inner();

        let delay = if max_delay > 0.0 {
            Some(
                Uniform::new(0.0, max_delay)
                    .map_err(|_| ConfigError::MessageDelayMax(config.message_delay_max))?,
            )
        } else {
            None
        };

        let delivery = Bernoulli::new(config.delivery_probability)
            .map_err(|_| ConfigError::DeliveryProbability(config.delivery_probability))?;

        Ok(DeliveryModel {
            delay,
            delivery,
            rng,
        })
    }

    /// Uniformly distributed in `[0, message_delay_max)`.
    pub fn sample_delay(&mut self) -> Time {
        match &self.delay {
            Some(dist) => Time::from_seconds(dist.sample(&mut self.rng)),
            None => Time::ZERO,
        }
    }

    /// Independent Bernoulli trial, true means the message was delivered.
    pub fn accept(&mut self) -> bool {
        self.delivery.sample(&mut self.rng)
    }
}
