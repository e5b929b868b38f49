//! Derived-lead reconstruction.
//!
//! XLI stores III, aVR, aVL and aVF as residuals against values computed
//! from I and II. After all leads are decoded the residuals are replaced,
//! in this order, by
//!
//! ```text
//! III = II - I - III
//! aVR = -((I + II) / 2) - aVR
//! aVL = (I - III) / 2 - aVL
//! aVF = (II + III) / 2 - aVF
//! ```
//!
//! where aVL and aVF use the already corrected III. Division truncates
//! toward zero; results wrap to i16.

use crate::record::{derivation_for, EcgRecord, LeadDerivation, LeadId};

/// Replaces the residuals of III, aVR, aVL and aVF with their final values.
///
/// A lead is only rebuilt if it and all leads it depends on are present.
pub fn reconstruct_derived_leads(record: &mut EcgRecord) {
    rebuild(record, LeadId::III, |i, ii, _, r| ii - i - r);
    rebuild(record, LeadId::AVR, |i, ii, _, r| -((i + ii) / 2) - r);
    rebuild(record, LeadId::AVL, |i, _, iii, r| (i - iii) / 2 - r);
    rebuild(record, LeadId::AVF, |_, ii, iii, r| (ii + iii) / 2 - r);
}

/// Rebuilds `target` sample by sample as `f(I, II, III, residual)`.
///
/// III is passed as 0 while III itself is being rebuilt.
fn rebuild(record: &mut EcgRecord, target: LeadId, f: impl Fn(i32, i32, i32, i32) -> i32) {
    let deps = match derivation_for(target.index()) {
        LeadDerivation::Derived(deps) => deps,
        LeadDerivation::Recorded => return,
    };
    if !record.has_lead(target.index()) || deps.iter().any(|d| !record.has_lead(d.index())) {
        log::trace!("skipping reconstruction of {}: lead or dependency missing", target.name());
        return;
    }

    let leads = record.leads_mut();
    let mut residual = std::mem::take(leads[target.index()].samples_mut());
    {
        let i = leads[LeadId::I.index()].samples();
        let ii = leads[LeadId::II.index()].samples();
        let iii = (target != LeadId::III).then(|| leads[LeadId::III.index()].samples());

        for (n, r) in residual.iter_mut().enumerate() {
            let at = |s: &[i16]| s.get(n).copied().map_or(0, i32::from);
            let iii_n = iii.map_or(0, at);
            *r = f(at(i), at(ii), iii_n, i32::from(*r)) as i16;
        }
    }
    *leads[target.index()].samples_mut() = residual;
}
