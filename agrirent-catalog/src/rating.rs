/// Recomputed review aggregate for one equipment item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    pub rating: f64,
    pub review_count: u32,
}

impl RatingAggregate {
    /// Mean of all ratings, rounded to 1 decimal.
    pub fn from_ratings(ratings: &[u8]) -> Self {
        if ratings.is_empty() {
            return Self {
                rating: 0.0,
                review_count: 0,
            };
        }

        let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
        let mean = f64::from(sum) / ratings.len() as f64;

        Self {
            rating: (mean * 10.0).round() / 10.0,
            review_count: ratings.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ratings() {
        let agg = RatingAggregate::from_ratings(&[]);
        assert_eq!(agg.rating, 0.0);
        assert_eq!(agg.review_count, 0);
    }

    #[test]
    fn test_mean_rounds_to_one_decimal() {
        // (5 + 4 + 4) / 3 = 4.333... -> 4.3
        let agg = RatingAggregate::from_ratings(&[5, 4, 4]);
        assert_eq!(agg.rating, 4.3);
        assert_eq!(agg.review_count, 3);

        // (5 + 4) / 2 = 4.5 stays 4.5
        let agg = RatingAggregate::from_ratings(&[5, 4]);
        assert_eq!(agg.rating, 4.5);
    }
}
