// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod coloc_result;
pub mod credible_set;
pub mod overlap;
pub mod study_index;
pub mod study_locus;
pub mod summary;
pub mod variant;

pub use coloc_result::{ColocMethod, ColocResult};
pub use credible_set::{CredibleSet, CredibleSetMember};
pub use overlap::{OverlapPair, OverlapRow};
pub use study_index::{DiscoverySample, StudyIndex, StudyType};
pub use study_locus::{Confidence, QualityControl, StudyLocus, TagVariant};
pub use summary::SummaryRecord;
pub use variant::Variant;
