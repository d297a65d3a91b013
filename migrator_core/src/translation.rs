//! Translation between the legacy track/subtrack taxonomy and the canonical track/type one.
//!
//! The forward direction ([`legacy_to_canonical`]) is a decision table keyed by
//! `(track, subtrack)`; some entries additionally branch on `is_task` or on the legacy tags.
//! The inverse ([`canonical_to_legacy`]) is total but lossy: tags can't be recovered.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MigrationError;

/// Legacy tag that moves a `CODE` challenge to the data science track.
pub const MARATHON_MATCH_TAG: &str = "Marathon Match";
/// Legacy tag that moves a `CODE` challenge to the data science track.
pub const DATA_SCIENCE_TAG: &str = "Data Science";
/// Canonical tag for non competitive-programming marathon matches.
pub const DATA_SCIENCE_MATCH_TAG: &str = "Data Science Match";
const FE_DESIGN_TAG: &str = "Front-End Design";
const IDEATION_TAG: &str = "Ideation";
const WIREFRAME_TAG: &str = "Wireframe";
const BUG_HUNT_TAG: &str = "Bug Hunt";
const TEST_SUITES_TAG: &str = "Test Suites";
const TEST_SCENARIOS_TAG: &str = "Test Scenarios";
const TESTING_COMPETITION_TAG: &str = "Testing Competition";

macro_rules! legacy_names {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $literal:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                #[serde(rename = $literal)]
                $variant,
            )+
        }

        impl $name {
            /// Every known value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The literal used by the legacy system.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $literal),+
                }
            }
        }

        impl FromStr for $name {
            type Err = MigrationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($literal => Ok($name::$variant),)+
                    other => Err(MigrationError::Validation(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

legacy_names! {
    /// Top level legacy track.
    LegacyTrack {
        Develop => "DEVELOP",
        DataScience => "DATA_SCIENCE",
        Design => "DESIGN",
    }
}

legacy_names! {
    /// Fine grained legacy category.
    LegacySubtrack {
        MarathonMatch => "MARATHON_MATCH",
        DesignFirst2Finish => "DESIGN_FIRST_2_FINISH",
        ApplicationFrontEndDesign => "APPLICATION_FRONT_END_DESIGN",
        WebDesigns => "WEB_DESIGNS",
        IdeaGeneration => "IDEA_GENERATION",
        WidgetOrMobileScreenDesign => "WIDGET_OR_MOBILE_SCREEN_DESIGN",
        Wireframes => "WIREFRAMES",
        PrintOrPresentation => "PRINT_OR_PRESENTATION",
        StudioOther => "STUDIO_OTHER",
        BannersOrIcons => "BANNERS_OR_ICONS",
        LogoDesign => "LOGO_DESIGN",
        FrontEndFlash => "FRONT_END_FLASH",
        Development => "DEVELOPMENT",
        First2Finish => "FIRST_2_FINISH",
        Code => "CODE",
        CopilotPosting => "COPILOT_POSTING",
        BugHunt => "BUG_HUNT",
        DevelopMarathonMatch => "DEVELOP_MARATHON_MATCH",
        TestSuites => "TEST_SUITES",
        UiPrototypeCompetition => "UI_PROTOTYPE_COMPETITION",
        Architecture => "ARCHITECTURE",
        AssemblyCompetition => "ASSEMBLY_COMPETITION",
        Specification => "SPECIFICATION",
        TestScenarios => "TEST_SCENARIOS",
        Conceptualization => "CONCEPTUALIZATION",
        ContentCreation => "CONTENT_CREATION",
        Design => "DESIGN",
        RiaBuildCompetition => "RIA_BUILD_COMPETITION",
        RiaComponentCompetition => "RIA_COMPONENT_COMPETITION",
        Reporting => "REPORTING",
        Process => "PROCESS",
        Legacy => "Legacy",
        TestingCompetition => "TESTING_COMPETITION",
        Deployment => "DEPLOYMENT",
        ComponentProduction => "COMPONENT_PRODUCTION",
        AutomatedTesting => "AUTOMATED TESTING",
        Security => "SECURITY",
    }
}

/// Canonical track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalTrack {
    /// Data Science
    DataScience,
    /// Design
    Design,
    /// Development
    Development,
    /// Quality Assurance
    QualityAssurance,
    /// Competitive Programming
    CompetitiveProgramming,
}

impl CanonicalTrack {
    /// Every canonical track.
    pub const ALL: &'static [CanonicalTrack] = &[
        CanonicalTrack::DataScience,
        CanonicalTrack::Design,
        CanonicalTrack::Development,
        CanonicalTrack::QualityAssurance,
        CanonicalTrack::CompetitiveProgramming,
    ];

    /// The identifier of the track in the canonical store.
    pub const fn id(&self) -> Uuid {
        match self {
            CanonicalTrack::DataScience => Uuid::from_u128(0xc0f5d461_8219_4c14_878a_c3a3f356466d),
            CanonicalTrack::Design => Uuid::from_u128(0x5fa04185_041f_49a6_bfd1_fe82533cd6c8),
            CanonicalTrack::Development => Uuid::from_u128(0x9b6fc876_f4d9_4ccb_9dfd_419247628825),
            CanonicalTrack::QualityAssurance => {
                Uuid::from_u128(0x36e6a8d0_7e1e_4608_a673_64279d99c115)
            }
            CanonicalTrack::CompetitiveProgramming => {
                Uuid::from_u128(0x9d6e0de8_df14_4c76_ba0a_a9a8cb03a4ea)
            }
        }
    }

    /// Display name of the track.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalTrack::DataScience => "Data Science",
            CanonicalTrack::Design => "Design",
            CanonicalTrack::Development => "Development",
            CanonicalTrack::QualityAssurance => "Quality Assurance",
            CanonicalTrack::CompetitiveProgramming => "Competitive Programming",
        }
    }

    /// Looks a track up by its canonical id.
    pub fn from_id(id: Uuid) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }
}

/// Canonical challenge type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalType {
    /// Challenge
    Challenge,
    /// Task
    Task,
    /// First2Finish
    First2Finish,
    /// Practice Challenge
    PracticeChallenge,
    /// Marathon Match
    MarathonMatch,
    /// Rapid Development Match
    RapidDevelopmentMatch,
    /// Skill Builder
    SkillBuilder,
}

impl CanonicalType {
    /// Every canonical type.
    pub const ALL: &'static [CanonicalType] = &[
        CanonicalType::Challenge,
        CanonicalType::Task,
        CanonicalType::First2Finish,
        CanonicalType::PracticeChallenge,
        CanonicalType::MarathonMatch,
        CanonicalType::RapidDevelopmentMatch,
        CanonicalType::SkillBuilder,
    ];

    /// The identifier of the type in the canonical store.
    pub const fn id(&self) -> Uuid {
        match self {
            CanonicalType::Challenge => Uuid::from_u128(0x927abff4_7af9_4145_8ba1_577c16e64e2e),
            CanonicalType::Task => Uuid::from_u128(0xecd58c69_238f_43a4_a4bb_d172719b9f31),
            CanonicalType::First2Finish => Uuid::from_u128(0xdc876fa4_ef2d_4eee_b701_b555fcc6544c),
            CanonicalType::PracticeChallenge => {
                Uuid::from_u128(0x34602883_a58d_45a9_b370_749574b6890d)
            }
            CanonicalType::MarathonMatch => Uuid::from_u128(0x929bc408_9cf2_4b3e_ba71_adfbf693046c),
            CanonicalType::RapidDevelopmentMatch => {
                Uuid::from_u128(0x78b37a69_92d5_4ad7_bf85_c79b65420c79)
            }
            CanonicalType::SkillBuilder => Uuid::from_u128(0xddc4252a_270c_408f_a15d_2f31c2141cd3),
        }
    }

    /// Display name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalType::Challenge => "Challenge",
            CanonicalType::Task => "Task",
            CanonicalType::First2Finish => "First2Finish",
            CanonicalType::PracticeChallenge => "Practice Challenge",
            CanonicalType::MarathonMatch => "Marathon Match",
            CanonicalType::RapidDevelopmentMatch => "Rapid Development Match",
            CanonicalType::SkillBuilder => "Skill Builder",
        }
    }

    /// Looks a type up by its canonical id.
    pub fn from_id(id: Uuid) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }
}

/// The canonical categorisation of a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCategory {
    /// Canonical track
    pub track: CanonicalTrack,
    /// Canonical type
    pub challenge_type: CanonicalType,
    /// Tags contributed by the translation
    pub tags: Vec<String>,
}

impl CanonicalCategory {
    fn new(track: CanonicalTrack, challenge_type: CanonicalType, tags: &[&str]) -> Self {
        Self {
            track,
            challenge_type,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Canonical track id.
    pub fn track_id(&self) -> Uuid {
        self.track.id()
    }

    /// Canonical type id.
    pub fn type_id(&self) -> Uuid {
        self.challenge_type.id()
    }
}

/// The legacy categorisation of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCategory {
    /// Legacy track
    pub track: LegacyTrack,
    /// Legacy subtrack
    pub subtrack: LegacySubtrack,
    /// Whether the legacy challenge is a task
    pub is_task: bool,
}

impl LegacyCategory {
    const fn new(track: LegacyTrack, subtrack: LegacySubtrack, is_task: bool) -> Self {
        Self {
            track,
            subtrack,
            is_task,
        }
    }
}

fn first_2_finish_or_task(is_task: bool) -> CanonicalType {
    if is_task {
        CanonicalType::Task
    } else {
        CanonicalType::First2Finish
    }
}

fn has_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|t| t == tag)
}

fn unmapped(track: LegacyTrack, subtrack: LegacySubtrack) -> MigrationError {
    MigrationError::Validation(format!(
        "No canonical mapping for legacy track {} / subtrack {}",
        track, subtrack
    ))
}

/// Maps a legacy `(track, subtrack, is_task, tags)` combination to its canonical category.
///
/// `is_task` only matters for subtracks that have a First2Finish variant. Combinations absent
/// from the table fail with [`MigrationError::Validation`].
pub fn legacy_to_canonical(
    track: LegacyTrack,
    subtrack: LegacySubtrack,
    is_task: bool,
    tags: &[String],
) -> Result<CanonicalCategory, MigrationError> {
    use CanonicalTrack as T;
    use CanonicalType as K;
    use LegacySubtrack as S;

    let category = match track {
        LegacyTrack::DataScience => match subtrack {
            S::MarathonMatch => CanonicalCategory::new(
                T::DataScience,
                K::Challenge,
                &[DATA_SCIENCE_MATCH_TAG],
            ),
            _ => return Err(unmapped(track, subtrack)),
        },
        LegacyTrack::Design => match subtrack {
            S::DesignFirst2Finish => {
                CanonicalCategory::new(T::Design, first_2_finish_or_task(is_task), &[])
            }
            S::ApplicationFrontEndDesign => {
                CanonicalCategory::new(T::Design, K::Challenge, &[FE_DESIGN_TAG])
            }
            S::IdeaGeneration => CanonicalCategory::new(T::Design, K::Challenge, &[IDEATION_TAG]),
            S::Wireframes => CanonicalCategory::new(T::Design, K::Challenge, &[WIREFRAME_TAG]),
            S::WebDesigns
            | S::WidgetOrMobileScreenDesign
            | S::PrintOrPresentation
            | S::StudioOther
            | S::BannersOrIcons
            | S::LogoDesign
            | S::FrontEndFlash => CanonicalCategory::new(T::Design, K::Challenge, &[]),
            _ => return Err(unmapped(track, subtrack)),
        },
        LegacyTrack::Develop => match subtrack {
            S::First2Finish => {
                CanonicalCategory::new(T::Development, first_2_finish_or_task(is_task), &[])
            }
            S::Code => {
                if has_tag(tags, MARATHON_MATCH_TAG) || has_tag(tags, DATA_SCIENCE_TAG) {
                    CanonicalCategory::new(T::DataScience, K::Challenge, &[])
                } else {
                    CanonicalCategory::new(T::Development, K::Challenge, &[])
                }
            }
            S::BugHunt => CanonicalCategory::new(T::QualityAssurance, K::Challenge, &[BUG_HUNT_TAG]),
            S::DevelopMarathonMatch => {
                CanonicalCategory::new(T::DataScience, K::Challenge, &[MARATHON_MATCH_TAG])
            }
            S::TestSuites => {
                CanonicalCategory::new(T::QualityAssurance, K::Challenge, &[TEST_SUITES_TAG])
            }
            S::TestScenarios => {
                CanonicalCategory::new(T::QualityAssurance, K::Challenge, &[TEST_SCENARIOS_TAG])
            }
            S::TestingCompetition => CanonicalCategory::new(
                T::QualityAssurance,
                K::Challenge,
                &[TESTING_COMPETITION_TAG],
            ),
            S::Development
            | S::CopilotPosting
            | S::UiPrototypeCompetition
            | S::Architecture
            | S::AssemblyCompetition
            | S::Specification
            | S::Conceptualization
            | S::ContentCreation
            | S::Design
            | S::RiaBuildCompetition
            | S::RiaComponentCompetition
            | S::Reporting
            | S::Process
            | S::Legacy
            | S::Deployment
            | S::ComponentProduction
            | S::Security
            | S::AutomatedTesting => CanonicalCategory::new(T::Development, K::Challenge, &[]),
            _ => return Err(unmapped(track, subtrack)),
        },
    };

    Ok(category)
}

/// Same as [`legacy_to_canonical`], starting from the raw literals found in the legacy index.
pub fn translate_legacy(
    track: &str,
    subtrack: &str,
    is_task: bool,
    tags: &[String],
) -> Result<CanonicalCategory, MigrationError> {
    let track = track.parse::<LegacyTrack>()?;
    let subtrack = subtrack.parse::<LegacySubtrack>()?;
    legacy_to_canonical(track, subtrack, is_task, tags)
}

/// Maps a canonical `(track, type)` back to a legacy category.
///
/// Every canonical combination has an answer, and every answer is accepted again by
/// [`legacy_to_canonical`]. Tags are not part of the answer.
///
/// Marathon matches outside Data Science map to `DEVELOP_MARATHON_MATCH` (Design ones to
/// `WEB_DESIGNS`) rather than to the `MARATHON_MATCH` subtrack, which only translates forward
/// to Data Science.
pub fn canonical_to_legacy(track: CanonicalTrack, challenge_type: CanonicalType) -> LegacyCategory {
    use CanonicalTrack as T;
    use CanonicalType as K;
    use LegacySubtrack as S;
    use LegacyTrack as L;

    match (track, challenge_type) {
        (T::DataScience, K::Challenge)
        | (T::DataScience, K::PracticeChallenge)
        | (T::DataScience, K::MarathonMatch)
        | (T::DataScience, K::SkillBuilder) => {
            LegacyCategory::new(L::DataScience, S::MarathonMatch, false)
        }
        (T::DataScience, K::RapidDevelopmentMatch) => LegacyCategory::new(L::Develop, S::Code, false),

        (T::Design, K::First2Finish) => LegacyCategory::new(L::Design, S::DesignFirst2Finish, false),
        (T::Design, K::Task) => LegacyCategory::new(L::Design, S::DesignFirst2Finish, true),
        (T::Design, K::Challenge)
        | (T::Design, K::PracticeChallenge)
        | (T::Design, K::MarathonMatch)
        | (T::Design, K::RapidDevelopmentMatch)
        | (T::Design, K::SkillBuilder) => LegacyCategory::new(L::Design, S::WebDesigns, false),

        (T::Development, K::Challenge) => LegacyCategory::new(L::Develop, S::Code, false),
        (T::QualityAssurance, K::Challenge) | (T::CompetitiveProgramming, K::Challenge) => {
            LegacyCategory::new(L::Develop, S::BugHunt, false)
        }

        (T::DataScience, K::First2Finish)
        | (T::Development, K::First2Finish)
        | (T::QualityAssurance, K::First2Finish)
        | (T::CompetitiveProgramming, K::First2Finish) => {
            LegacyCategory::new(L::Develop, S::First2Finish, false)
        }
        (T::DataScience, K::Task)
        | (T::Development, K::Task)
        | (T::QualityAssurance, K::Task)
        | (T::CompetitiveProgramming, K::Task) => LegacyCategory::new(L::Develop, S::First2Finish, true),

        (T::Development, K::MarathonMatch)
        | (T::QualityAssurance, K::MarathonMatch)
        | (T::CompetitiveProgramming, K::MarathonMatch) => {
            LegacyCategory::new(L::Develop, S::DevelopMarathonMatch, false)
        }
        (T::Development, K::PracticeChallenge)
        | (T::Development, K::RapidDevelopmentMatch)
        | (T::Development, K::SkillBuilder)
        | (T::QualityAssurance, K::PracticeChallenge)
        | (T::QualityAssurance, K::RapidDevelopmentMatch)
        | (T::QualityAssurance, K::SkillBuilder)
        | (T::CompetitiveProgramming, K::PracticeChallenge)
        | (T::CompetitiveProgramming, K::RapidDevelopmentMatch)
        | (T::CompetitiveProgramming, K::SkillBuilder) => LegacyCategory::new(L::Develop, S::Code, false),
    }
}

/// Same as [`canonical_to_legacy`], starting from canonical ids.
pub fn canonical_ids_to_legacy(track_id: Uuid, type_id: Uuid) -> Result<LegacyCategory, MigrationError> {
    let track = CanonicalTrack::from_id(track_id)
        .ok_or_else(|| MigrationError::Validation(format!("Unknown canonical track id {}", track_id)))?;
    let challenge_type = CanonicalType::from_id(type_id)
        .ok_or_else(|| MigrationError::Validation(format!("Unknown canonical type id {}", type_id)))?;
    Ok(canonical_to_legacy(track, challenge_type))
}
